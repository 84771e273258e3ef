use std::collections::HashSet;
use xskpipe::engine::CycleReport;
use xskpipe::simulator::{loopback, DeliverError, LoopbackPeer};
use xskpipe::{Packet, Pipeline, PipelineConfig, SourcePrinter};
use xskpipe_core::ring::XdpDesc;
use xskpipe_core::umem::{FrameState, UmemLayout};

fn setup(frames: u32, ring_size: u32) -> (Pipeline, LoopbackPeer) {
    let layout = UmemLayout::new(2048, frames).unwrap();
    let (umem, rings, peer) = loopback(layout, ring_size).unwrap();
    let pipeline = Pipeline::new(umem, rings, PipelineConfig::default()).unwrap();
    (pipeline, peer)
}

fn ethernet_frame(src: [u8; 6], len: usize) -> Vec<u8> {
    let mut frame = vec![0u8; len];
    frame[..6].copy_from_slice(&[0xff; 6]);
    frame[6..12].copy_from_slice(&src);
    frame[12..14].copy_from_slice(&0x0800u16.to_be_bytes());
    frame
}

fn ignore(_: &Packet<'_>) {}

#[test]
fn test_initial_replenish_fills_ring() {
    let (mut pipeline, peer) = setup(4, 4);

    assert_eq!(pipeline.replenish(), 4);
    assert_eq!(pipeline.pool().available(), 0);
    assert_eq!(peer.fill_pending(), 4);
    assert_eq!(pipeline.census().in_flight, 4);
}

#[test]
fn test_short_batch_is_topped_up_next_cycle() {
    let (mut pipeline, mut peer) = setup(4, 4);
    pipeline.replenish();

    let frame = ethernet_frame([2, 0, 0, 0, 0, 1], 60);
    peer.deliver(&frame).unwrap();
    peer.deliver(&frame).unwrap();
    assert_eq!(peer.fill_pending(), 2);

    let report = pipeline.cycle(&mut ignore);
    assert_eq!(report, CycleReport { filled: 0, received: 2 });
    assert_eq!(peer.rx_pending(), 0);
    assert_eq!(pipeline.pool().available(), 2);

    let report = pipeline.cycle(&mut ignore);
    assert_eq!(report, CycleReport { filled: 2, received: 0 });
    assert_eq!(peer.fill_pending(), 4);
}

#[test]
fn test_exhausted_pool_submits_only_what_it_has() {
    let (mut pipeline, peer) = setup(4, 8);

    assert_eq!(pipeline.replenish(), 4);
    assert_eq!(peer.fill_pending(), 4);
    assert_eq!(pipeline.stats().pool_exhausted, 1);

    assert_eq!(pipeline.replenish(), 0);
    assert_eq!(peer.fill_pending(), 4);
}

#[test]
fn test_batch_size_bounds_each_cycle() {
    let (mut pipeline, mut peer) = setup(64, 64);
    pipeline.replenish();

    let frame = ethernet_frame([2, 0, 0, 0, 0, 2], 64);
    for _ in 0..40 {
        peer.deliver(&frame).unwrap();
    }

    let mut seen = 0;
    let mut count = |_: &Packet<'_>| seen += 1;
    let received: Vec<u32> = (0..4).map(|_| pipeline.cycle(&mut count).received).collect();
    assert_eq!(received, vec![16, 16, 8, 0]);
    assert_eq!(seen, 40);
    assert_eq!(pipeline.stats().rx_packets, 40);
    assert_eq!(pipeline.stats().rx_bytes, 40 * 64);
}

#[test]
fn test_frames_cycle_without_duplication() {
    let (mut pipeline, mut peer) = setup(4, 4);
    pipeline.replenish();

    let mut delivered = 0u32;
    for i in 0..200u32 {
        let mut frame = ethernet_frame([2, 0, 0, 0, 0, 3], 60);
        frame[14..18].copy_from_slice(&i.to_be_bytes());

        match peer.deliver(&frame) {
            Ok(addr) => {
                delivered += 1;
                assert_eq!(pipeline.pool().state(addr), Some(FrameState::InFlight));
            }
            Err(DeliverError::NoFillBuffers) => {}
            Err(e) => panic!("unexpected delivery failure: {e}"),
        }

        let mut batch_frames = HashSet::new();
        let mut expect_next = |p: &Packet<'_>| {
            assert!(batch_frames.insert(p.frame()), "frame seen twice in one batch");
        };
        pipeline.cycle(&mut expect_next);

        let census = pipeline.census();
        assert_eq!(census.total(), 4);
        assert_eq!(census.ready, 0);
        assert_eq!(
            census.in_flight,
            (peer.fill_pending() + peer.rx_pending()) as usize
        );
    }

    assert!(delivered > 100);
    assert_eq!(pipeline.stats().rx_packets, delivered as u64);
}

#[test]
fn test_prints_source_of_each_packet() {
    let (mut pipeline, mut peer) = setup(8, 4);
    pipeline.replenish();

    peer.deliver(&ethernet_frame([0x02, 0, 0, 0, 0, 0x01], 60)).unwrap();
    peer.deliver(&ethernet_frame([0xde, 0xad, 0xbe, 0xef, 0, 0x02], 60)).unwrap();

    let mut printer = SourcePrinter::new(Vec::new());
    pipeline.cycle(&mut printer);

    let out = String::from_utf8(printer.into_inner()).unwrap();
    assert_eq!(
        out,
        "Received packet from 02:00:00:00:00:01\nReceived packet from de:ad:be:ef:00:02\n"
    );
}

#[test]
fn test_malformed_packet_is_skipped_and_recycled() {
    let (mut pipeline, mut peer) = setup(4, 4);
    pipeline.replenish();

    let addr = peer.deliver(&[0u8; 10]).unwrap();
    let mut seen = 0;
    let report = pipeline.cycle(&mut |_: &Packet<'_>| seen += 1);

    assert_eq!(report.received, 1);
    assert_eq!(seen, 0);
    assert_eq!(pipeline.stats().malformed, 1);
    assert_eq!(pipeline.pool().state(addr), Some(FrameState::Free));
}

#[test]
fn test_foreign_descriptor_leaves_pool_untouched() {
    let (mut pipeline, mut peer) = setup(8, 4);
    pipeline.replenish();
    let before = pipeline.census();

    // Frame 0 is still on the free list; the other address is past the UMEM.
    peer.deliver_desc(XdpDesc::new(0, 60)).unwrap();
    peer.deliver_desc(XdpDesc::new(1 << 32, 60)).unwrap();

    let report = pipeline.cycle(&mut ignore);
    assert_eq!(report.received, 2);
    assert_eq!(pipeline.stats().foreign_frames, 2);
    assert_eq!(pipeline.census(), before);
    assert_eq!(peer.rx_pending(), 0);
}

#[test]
fn test_packet_behind_headroom() {
    let (mut pipeline, mut peer) = setup(4, 4);
    pipeline.replenish();

    let frame = peer.take_fill().unwrap();
    peer.deliver_desc(XdpDesc::new(frame + 256, 60)).unwrap();

    let mut frames = Vec::new();
    pipeline.cycle(&mut |p: &Packet<'_>| frames.push((p.frame(), p.addr())));
    assert_eq!(frames, vec![(frame, frame + 256)]);
    assert_eq!(pipeline.pool().state(frame), Some(FrameState::Free));
}
