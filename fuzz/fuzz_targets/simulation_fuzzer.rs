//! Fuzz target for the full client stack against the simulated server
//!
//! Bytes decode into user and server operations applied to a
//! [`Simulation`]. Pending responses are held and released in a shuffled
//! order, so stale tickets and out-of-order pages are exercised.
//!
//! # Invariants
//!
//! The standard invariant registry runs after every step and panics on the
//! first violation:
//! - No duplicate message ids in the window
//! - Window ordered by creation time
//! - Window only holds messages of the active room
//! - Joins and leaves are symmetric, one room at a time
//! - Sends only go to a joined room

#![no_main]

use arbitrary::{Arbitrary, Unstructured};
use libfuzzer_sys::fuzz_target;
use roomsync_harness::{Delivery, Operation, Simulation};

fuzz_target!(|data: &[u8]| {
    let mut u = Unstructured::new(data);
    let Ok(held) = bool::arbitrary(&mut u) else {
        return;
    };
    let Ok(operations) = Vec::<Operation>::arbitrary(&mut u) else {
        return;
    };
    let delivery = if held { Delivery::Held } else { Delivery::Immediate };

    let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
    rt.block_on(async {
        let mut sim = Simulation::standard(delivery, 25);
        sim.start().await.unwrap();
        for operation in &operations {
            sim.apply(operation).await.unwrap();
        }
        sim.driver().release();
        sim.settle().await.unwrap();
    });
});
