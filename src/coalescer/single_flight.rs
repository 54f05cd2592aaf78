use parking_lot::Mutex;
use std::mem;

/// Gate and pending queue guarding one external operation.
///
/// At most one fetch cycle is open at a time. The gate only closes once a
/// [`take_batch`](SingleFlight::take_batch) call observes an empty queue, so a
/// request pushed while a batch is being served is never orphaned.
pub(super) struct SingleFlight<R> {
    state: Mutex<FlightState<R>>,
}

struct FlightState<R> {
    in_flight: bool,
    queue: Vec<R>,
}

impl<R> SingleFlight<R> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FlightState {
                in_flight: false,
                queue: Vec::new(),
            }),
        }
    }

    /// Queue `request`. Returns `true` when the caller opened a new cycle and
    /// is therefore responsible for running it.
    pub fn push(&self, request: R) -> bool {
        let mut state = self.state.lock();
        state.queue.push(request);
        !mem::replace(&mut state.in_flight, true)
    }

    /// Take every pending request. An empty batch means the cycle is over and
    /// the gate is open again.
    pub fn take_batch(&self) -> Vec<R> {
        let mut state = self.state.lock();
        let batch = mem::take(&mut state.queue);
        if batch.is_empty() {
            state.in_flight = false;
        }
        batch
    }

    /// Serve batches until the queue is observed empty, returning how many
    /// requests were served. `serve` may push new requests.
    pub fn drain(&self, mut serve: impl FnMut(R)) -> usize {
        let mut served = 0;
        loop {
            let batch = self.take_batch();
            if batch.is_empty() {
                return served;
            }
            served += batch.len();
            batch.into_iter().for_each(&mut serve);
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.state.lock().in_flight
    }

    pub fn pending(&self) -> usize {
        self.state.lock().queue.len()
    }
}
