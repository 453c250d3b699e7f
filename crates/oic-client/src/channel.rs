use std::time::Duration;

use flume::{Receiver, RecvTimeoutError};

use oic::status::Status;

use tracing::debug;

use crate::error::{Error, Result};

/// The receiving side of a single response.
///
/// Returned by [`response_channel`].
pub struct PendingResponse<T> {
    receiver: Receiver<Result<T>>,
}

impl<T> PendingResponse<T> {
    /// Blocks until the response arrives or the timeout expires.
    ///
    /// # Errors
    ///
    /// A [`Status::SlowResource`] error is returned when the timeout expires.
    /// A [`Status::GenericError`] error is returned when the request has been
    /// abandoned. Any other error is the one delivered to the callback.
    pub fn wait(self, timeout: Duration) -> Result<T> {
        match self.receiver.recv_timeout(timeout) {
            Ok(response) => response,
            Err(RecvTimeoutError::Timeout) => Err(Error::new(
                Status::SlowResource,
                format!("No response within {timeout:?}"),
            )),
            Err(RecvTimeoutError::Disconnected) => Err(abandoned()),
        }
    }

    /// Waits asynchronously for the response.
    ///
    /// # Errors
    ///
    /// Same as [`PendingResponse::wait`], except for the timeout.
    pub async fn recv_async(self) -> Result<T> {
        self.receiver
            .recv_async()
            .await
            .unwrap_or_else(|_| Err(abandoned()))
    }
}

fn abandoned() -> Error {
    Error::new(
        Status::GenericError,
        "The request has been abandoned before its response",
    )
}

/// Creates a single-shot callback together with the [`PendingResponse`]
/// receiving its result.
///
/// The callback can be passed to any request method of a
/// [`Client`](crate::client::Client).
pub fn response_channel<T: Send + 'static>()
-> (impl FnOnce(Result<T>) + Send + 'static, PendingResponse<T>) {
    let (sender, receiver) = flume::bounded(1);

    let callback = move |response| {
        if sender.send(response).is_err() {
            debug!("The pending response has been dropped");
        }
    };

    (callback, PendingResponse { receiver })
}

/// Creates a callback forwarding every value it receives to a channel.
///
/// It turns the discovery, observation, and presence callbacks into a
/// stream of events. The callback can be cloned to feed the same channel
/// from several operations.
pub fn events_channel<T: Send + 'static>()
-> (impl Fn(T) + Clone + Send + Sync + 'static, Receiver<T>) {
    let (sender, receiver) = flume::unbounded();

    let callback = move |event| {
        if sender.send(event).is_err() {
            debug!("The events receiver has been dropped");
        }
    };

    (callback, receiver)
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::Duration;

    use oic::query::QueryParams;
    use oic::status::Status;

    use crate::request::Response;
    use crate::stack::StackEvent;
    use crate::tests::{TIMEOUT, light, start_client};

    use super::{events_channel, response_channel};

    #[test]
    fn timeout_and_abandon() {
        let (callback, response) = response_channel::<u32>();
        assert_eq!(
            response
                .wait(Duration::from_millis(10))
                .unwrap_err()
                .status(),
            Status::SlowResource
        );
        drop(callback);

        let (callback, response) = response_channel::<u32>();
        drop(callback);
        assert_eq!(
            response.wait(TIMEOUT).unwrap_err().status(),
            Status::GenericError
        );

        let (callback, response) = response_channel::<u32>();
        thread::spawn(move || callback(Ok(7)));
        assert_eq!(response.wait(TIMEOUT).unwrap(), 7);
    }

    #[test]
    fn shared_events_channel() {
        let (callback, events) = events_channel::<u32>();

        let other = callback.clone();
        callback(1);
        other(2);
        drop(events);
        // A dropped receiver is not an error.
        callback(3);
    }

    #[tokio::test]
    async fn async_response() {
        let (_platform, control, client) = start_client();
        let (callback, response) = response_channel::<Response>();

        let token = client
            .get_resource(&light(), &QueryParams::new(), &[], callback)
            .unwrap();
        control.inject(StackEvent::new(token, Status::Ok));

        let response = response.recv_async().await.unwrap();
        assert_eq!(response.status(), Status::Ok);
    }
}
