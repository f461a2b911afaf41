use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use memview::{
    sys::{
        alloc::{restore_default_allocator, set_default_allocator},
        device::sim::Sim,
        Memory,
    },
    Float32Buffer, Int64Buffer, Uint8Buffer,
};
use serial_test::serial;

#[test]
#[serial]
fn hook_sees_fresh_allocations_only() {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);
    let prev = set_default_allocator(move |byte_len| {
        seen.fetch_add(1, Ordering::SeqCst);
        Memory::new(byte_len)
    });

    let v = Int64Buffer::new(4).unwrap();
    let from_host = Int64Buffer::from_source(&[1, 2, 3]).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    // wrapping and windowing reuse memory
    let _sub = v.subarray(1, None);
    let _slice = v.slice(0, Some(2)).unwrap();
    let _wrapped = Int64Buffer::wrap(v.buffer().clone(), 8, 2usize).unwrap();
    let _cast = Uint8Buffer::from_source(&from_host).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    let _copy = from_host.to_owned_copy().unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    restore_default_allocator(prev);
}

#[test]
#[serial]
fn hook_routes_views_to_another_device() {
    let sim = Sim::new(9);
    let device = Arc::new(sim.clone());
    let prev = set_default_allocator(move |byte_len| Memory::new_on(device.clone(), byte_len));

    let v = Float32Buffer::from_source(&[1.0f32, 2.0]).unwrap();
    assert_eq!(v.buffer().device_id(), 9);
    assert_eq!(sim.used(), 8);

    // existing views keep their memory after the hook changes back
    restore_default_allocator(prev);
    let other = Float32Buffer::new(2).unwrap();
    assert_ne!(other.buffer().device_id(), 9);
    assert_eq!(v.to_vec().unwrap(), [1.0, 2.0]);

    drop(v);
    assert_eq!(sim.used(), 0);
}
