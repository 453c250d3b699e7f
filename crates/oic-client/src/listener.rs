use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::Ordering;
use std::thread::{self, ThreadId};

use tracing::{debug, error, info, warn};

use crate::client::Engine;
use crate::session::Session;
use crate::stack::{Stack, StackEvent};

// Polls the stack until the client stops or the platform is dropped.
pub(crate) fn run<S: Stack>(engine: &Engine<S>) {
    let listener = thread::current().id();
    info!("Listener started");

    loop {
        let polled = engine.stack.with(|cell| {
            if !engine.running.load(Ordering::Acquire) {
                return Ok(None);
            }

            let surfaced = cell.stack.drive_pending_work();
            cell.routes.distribute(surfaced);

            Ok(Some(cell.routes.collect(engine.id)))
        });

        let events = match polled {
            Ok(Some(events)) => events,
            Ok(None) => break,
            Err(e) => {
                warn!("Stopping the listener: {e}");
                break;
            }
        };

        // Callbacks run without the stack lock, so they can send new
        // requests.
        for event in events {
            dispatch(engine, event, listener);
        }

        thread::sleep(engine.config.poll_interval);
    }

    info!("Listener stopped");
}

fn dispatch<S: Stack>(engine: &Engine<S>, event: StackEvent, listener: ThreadId) {
    let token = event.token;
    let Some(session) = engine.registry.lookup(token) else {
        debug!("No outstanding operation for the token {token}");
        return;
    };

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| match session {
        Session::Request(pending) => {
            if engine.registry.retire(token).is_some() {
                pending.complete(event);
            }
        }
        Session::Observe(session) => session.notify(&engine.registry, event, listener),
        Session::Presence(subscription) => {
            subscription.notify(&engine.registry, event, listener);
        }
        Session::Discovery(session) => session.announce(event, engine.config.connectivity),
    }));

    if outcome.is_err() {
        error!("A callback panicked while handling the token {token}");
    }
}
