use std::sync::{Arc, Mutex};
use std::thread;

use crossbeam_channel::{unbounded, Receiver, Sender};

/// Broadcast bus: everything sent through any [`sender`](EventBus::sender) is
/// delivered to every receiver obtained from [`subscribe`](EventBus::subscribe).
///
/// Subscribers only see events published after they subscribed. Dropped
/// receivers are pruned on the next publication. The forwarding thread exits
/// once the bus and every sender cloned from it are gone.
pub struct EventBus<X>
where
    X: Clone + Send + 'static,
{
    sender: Sender<X>,
    subscribers: Arc<Mutex<Vec<Sender<X>>>>,
}

impl<X> EventBus<X>
where
    X: Clone + Send + 'static,
{
    pub fn new() -> Self {
        let (sender, receiver) = unbounded::<X>();

        let bus = EventBus {
            sender,
            subscribers: Arc::new(Mutex::new(vec![])),
        };

        bus.forward(receiver);

        bus
    }

    fn forward(&self, receiver: Receiver<X>) {
        let subscribers = self.subscribers.clone();

        let _ = thread::Builder::new()
            .name("event-bus".to_string())
            .spawn(move || {
                for event in receiver {
                    let mut subscribers = match subscribers.lock() {
                        Ok(subscribers) => subscribers,
                        Err(poisoned) => poisoned.into_inner(),
                    };

                    subscribers.retain(|subscriber| subscriber.send(event.clone()).is_ok());
                }
            });
    }

    pub fn sender(&self) -> Sender<X> {
        self.sender.clone()
    }

    pub fn publish(&self, event: X) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> Receiver<X> {
        let (sender, receiver) = unbounded();

        match self.subscribers.lock() {
            Ok(mut subscribers) => subscribers.push(sender),
            Err(poisoned) => poisoned.into_inner().push(sender),
        }

        receiver
    }
}

impl<X> Default for EventBus<X>
where
    X: Clone + Send + 'static,
{
    fn default() -> Self {
        EventBus::new()
    }
}
