pub mod consumer;
pub mod desc;
pub mod heap;
pub mod producer;

pub use consumer::ConsumerRing;
pub use desc::XdpDesc;
pub use heap::HeapRing;
pub use producer::ProducerRing;

/// The four rings of one AF_XDP socket, together with whatever owns the
/// memory they point into (ring mmaps or heap rings).
pub struct RingSet {
    pub fill: ProducerRing<u64>,
    pub comp: ConsumerRing<u64>,
    pub rx: ConsumerRing<XdpDesc>,
    pub tx: ProducerRing<XdpDesc>,
    backing: Vec<Box<dyn Send>>,
}

impl RingSet {
    pub fn new(
        fill: ProducerRing<u64>,
        comp: ConsumerRing<u64>,
        rx: ConsumerRing<XdpDesc>,
        tx: ProducerRing<XdpDesc>,
    ) -> Self {
        Self {
            fill,
            comp,
            rx,
            tx,
            backing: Vec::new(),
        }
    }

    /// Keep `owner` alive for as long as the ring views exist.
    pub fn with_backing<O: Send + 'static>(mut self, owner: O) -> Self {
        self.backing.push(Box::new(owner));
        self
    }
}
