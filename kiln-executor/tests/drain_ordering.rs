//! Drain ordering and cross-queue dependency resolution.

mod common;

use common::*;
use kiln_core::command::{Command, KernelLaunch};
use kiln_core::device::DeviceCapabilities;
use kiln_core::event::{EventOwnership, EventStatus};
use kiln_core::kernel::Kernel;
use kiln_core::memory::MemFlags;
use kiln_core::queue::QueueProperties;
use kiln_core::testing::{BackendCall, recording_device, test_buffer};
use kiln_executor::CursorPolicy;
use std::sync::Arc;

#[test]
fn independent_commands_run_in_enqueue_order() {
    let (device, backend) = recording_device(DeviceCapabilities::empty());
    let exec = test_executor();
    let queue = exec.create_queue(Arc::clone(&device), QueueProperties::empty());
    let buffer = test_buffer(MemFlags::READ_WRITE, 64);

    let events = [
        enqueue(&queue, write_buffer(&device, &buffer, 0x1000), EventOwnership::User),
        enqueue(&queue, read_buffer(&device, &buffer, 0x2000), EventOwnership::User),
        enqueue(&queue, write_buffer(&device, &buffer, 0x3000), EventOwnership::User),
    ];

    let report = exec.finish(queue.id()).unwrap();
    assert_eq!(report.executed, 3);
    assert!(queue.is_empty());
    assert!(events.iter().all(|e| e.status() == EventStatus::Complete));

    let hosts: Vec<usize> = backend
        .calls()
        .into_iter()
        .map(|call| match call {
            BackendCall::Read { host_ptr, .. } | BackendCall::Write { host_ptr, .. } => {
                host_ptr.addr()
            }
            other => panic!("unexpected call {other:?}"),
        })
        .collect();
    assert_eq!(hosts, vec![0x1000, 0x2000, 0x3000]);
}

#[test]
fn kernel_waits_for_write_in_same_queue() {
    let (device, backend) = recording_device(DeviceCapabilities::empty());
    let exec = test_executor();
    let queue = exec.create_queue(Arc::clone(&device), QueueProperties::empty());
    let buffer = test_buffer(MemFlags::READ_WRITE, 256);
    let kernel = Arc::new(Kernel::new("scale", 1, 0));

    let write = enqueue(&queue, write_buffer(&device, &buffer, 0x1000), EventOwnership::User);
    let mut launch = KernelLaunch::new(Arc::clone(&kernel), [256, 1, 1], [64, 1, 1]);
    launch.arg_buffers = vec![Some(Arc::clone(&buffer))];
    let run = enqueue_waiting(
        &queue,
        Command::NdRangeKernel(launch),
        EventOwnership::User,
        &[&write],
    );

    exec.finish(queue.id()).unwrap();

    let calls = backend.calls();
    assert_eq!(calls.len(), 2);
    assert!(matches!(calls[0], BackendCall::Write { .. }));
    assert!(matches!(
        calls[1],
        BackendCall::Run { kernel_id, work_dim: 1, .. } if kernel_id == kernel.id()
    ));
    assert_eq!(write.status(), EventStatus::Complete);
    assert_eq!(run.status(), EventStatus::Complete);
}

#[test]
fn dependency_in_other_queue_is_pulled_in_first() {
    let (device, backend) = recording_device(DeviceCapabilities::empty());
    let exec = test_executor();
    let target = exec.create_queue(Arc::clone(&device), QueueProperties::empty());
    let other = exec.create_queue(Arc::clone(&device), QueueProperties::empty());
    let buffer = test_buffer(MemFlags::READ_WRITE, 32);

    let upload = enqueue(&other, write_buffer(&device, &buffer, 0xa000), EventOwnership::User);
    let download = enqueue_waiting(
        &target,
        read_buffer(&device, &buffer, 0xb000),
        EventOwnership::User,
        &[&upload],
    );

    let report = exec.finish(target.id()).unwrap();
    assert_eq!(report.executed, 2);
    assert!(other.is_empty());
    assert_eq!(upload.status(), EventStatus::Complete);
    assert_eq!(download.status(), EventStatus::Complete);

    let calls = backend.calls();
    assert!(matches!(calls[0], BackendCall::Write { .. }));
    assert!(matches!(calls[1], BackendCall::Read { .. }));
}

#[test]
fn satisfied_dependency_does_not_move_cursor() {
    let (device, backend) = recording_device(DeviceCapabilities::empty());
    let exec = test_executor();
    let target = exec.create_queue(Arc::clone(&device), QueueProperties::empty());
    let other = exec.create_queue(Arc::clone(&device), QueueProperties::empty());

    let done = enqueue_marker(&other);
    exec.finish(other.id()).unwrap();
    assert_eq!(done.status(), EventStatus::Complete);

    // Work left on the other queue must not be pulled into this drain.
    let buffer = test_buffer(MemFlags::READ_WRITE, 8);
    let unrelated = enqueue(&other, write_buffer(&device, &buffer, 0x10), EventOwnership::User);
    let waiter = enqueue_waiting(&target, Command::Marker, EventOwnership::User, &[&done]);

    let report = exec.finish(target.id()).unwrap();
    assert_eq!(report.executed, 1);
    assert_eq!(waiter.status(), EventStatus::Complete);
    assert_eq!(unrelated.status(), EventStatus::Queued);
    assert_eq!(other.len(), 1);
    assert_eq!(backend.call_count(), 0);
}

fn two_queue_dependency_order(policy: CursorPolicy) -> Vec<usize> {
    let (device, backend) = recording_device(DeviceCapabilities::empty());
    let exec = test_executor_with_policy(policy);
    let target = exec.create_queue(Arc::clone(&device), QueueProperties::empty());
    let qa = exec.create_queue(Arc::clone(&device), QueueProperties::empty());
    let qb = exec.create_queue(Arc::clone(&device), QueueProperties::empty());
    let buffer = test_buffer(MemFlags::READ_WRITE, 16);

    let a = enqueue(&qa, write_buffer(&device, &buffer, 0xa), EventOwnership::User);
    let b = enqueue(&qb, write_buffer(&device, &buffer, 0xb), EventOwnership::User);
    enqueue_waiting(
        &target,
        read_buffer(&device, &buffer, 0xc),
        EventOwnership::User,
        &[&a, &b],
    );

    exec.finish(target.id()).unwrap();
    backend
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            BackendCall::Read { host_ptr, .. } | BackendCall::Write { host_ptr, .. } => {
                Some(host_ptr.addr())
            }
            _ => None,
        })
        .collect()
}

#[test]
fn last_blocking_dependency_is_followed_first() {
    assert_eq!(
        two_queue_dependency_order(CursorPolicy::LastBlocking),
        vec![0xb, 0xa, 0xc]
    );
}

#[test]
fn first_blocking_policy_follows_wait_list_order() {
    assert_eq!(
        two_queue_dependency_order(CursorPolicy::FirstBlocking),
        vec![0xa, 0xb, 0xc]
    );
}

#[test]
fn dependents_never_run_before_prerequisites() {
    let (device, _backend) = recording_device(DeviceCapabilities::empty());
    let exec = test_executor();
    let target = exec.create_queue(Arc::clone(&device), QueueProperties::empty());
    let other = exec.create_queue(Arc::clone(&device), QueueProperties::empty());

    let first = enqueue_marker(&other);
    let second = enqueue_waiting(&other, Command::Marker, EventOwnership::User, &[&first]);
    let last = enqueue_waiting(&target, Command::Marker, EventOwnership::User, &[&second]);

    // Each callback checks its prerequisite already completed.
    let (f, s) = (Arc::clone(&first), Arc::clone(&second));
    second.add_callback(EventStatus::Complete, move |_, _| {
        assert_eq!(f.status(), EventStatus::Complete);
    });
    last.add_callback(EventStatus::Complete, move |_, _| {
        assert_eq!(s.status(), EventStatus::Complete);
    });

    let report = exec.finish(target.id()).unwrap();
    assert_eq!(report.executed, 3);
    assert_eq!(last.status(), EventStatus::Complete);
}

#[test]
fn drain_of_unknown_queue_is_an_error() {
    let (device, _backend) = recording_device(DeviceCapabilities::empty());
    let exec = test_executor();
    let queue = exec.create_queue(device, QueueProperties::empty());
    let event = enqueue_marker(&queue);
    exec.release_queue(queue.id()).unwrap();

    let err = exec.finish(queue.id()).unwrap_err();
    assert_eq!(err.code(), "E001");
    assert_eq!(queue.len(), 1);
    assert_eq!(event.status(), EventStatus::Queued);
    assert_eq!(exec.stats().drains, 0);
}

#[test]
fn released_queue_can_still_be_drained_by_handle() {
    let (device, _backend) = recording_device(DeviceCapabilities::empty());
    let exec = test_executor();
    let queue = exec.create_queue(device, QueueProperties::empty());
    let event = enqueue_marker(&queue);
    let handle = exec.release_queue(queue.id()).unwrap();

    let report = exec.finish_queue(&handle);
    assert_eq!(report.executed, 1);
    assert_eq!(event.status(), EventStatus::Complete);
}

#[test]
fn drains_are_logged_per_queue() {
    let (device, _backend) = recording_device(DeviceCapabilities::empty());
    let (exec, log) = logged_executor();
    let queue = exec.create_queue(device, QueueProperties::empty());
    enqueue_marker(&queue);
    enqueue_marker(&queue);

    exec.finish(queue.id()).unwrap();

    let messages: Vec<String> = log
        .by_queue(queue.id())
        .into_iter()
        .map(|e| e.message)
        .collect();
    assert_eq!(messages.first().map(String::as_str), Some("Drain started"));
    assert_eq!(messages.last().map(String::as_str), Some("Drain finished"));
    assert_eq!(
        messages.iter().filter(|m| *m == "Command admitted").count(),
        2
    );
    assert_eq!(
        messages.iter().filter(|m| *m == "Command complete").count(),
        2
    );

    let stats = exec.stats();
    assert_eq!(stats.drains, 1);
    assert_eq!(stats.commands_executed, 2);
}
