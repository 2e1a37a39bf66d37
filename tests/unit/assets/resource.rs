use std::collections::HashSet;

use super::*;

#[test]
fn identity_drives_equality_and_ordering() {
    let a1 = Resource::new(MemoryResource::new("a", vec![1], 10));
    let a2 = Resource::new(MemoryResource::new("a", vec![2, 3], 99));
    let b = Resource::new(MemoryResource::new("b", vec![], 10));

    assert_eq!(a1, a2);
    assert_ne!(a1, b);
    assert!(a1 < b);

    let set: HashSet<Resource> = [a1, a2, b].into_iter().collect();
    assert_eq!(set.len(), 2);
}

#[test]
fn memory_resource_replace_bumps_time_and_payload() {
    let mem = Arc::new(MemoryResource::new("x", vec![1, 2], 5));
    let res = Resource::from_arc(mem.clone());
    assert_eq!(res.read_all().unwrap(), vec![1, 2]);
    assert_eq!(res.modified_time(), 5);

    mem.replace(vec![9], 6);
    assert_eq!(res.read_all().unwrap(), vec![9]);
    assert_eq!(res.modified_time(), 6);

    mem.touch(42);
    assert_eq!(res.modified_time(), 42);
}

#[test]
fn missing_file_reports_sentinel_and_io_error() {
    let res = Resource::file("definitely/not/here.png");
    assert_eq!(res.modified_time(), UNKNOWN_MODIFIED);
    let Err(err) = res.open_stream() else {
        panic!("expected open failure");
    };
    assert!(matches!(err, CompositorError::Io(_)), "{err:?}");
}

#[test]
fn file_identity_normalizes_separators() {
    assert_eq!(
        Resource::file("parts\\hair.png"),
        Resource::file("parts/hair.png")
    );
}
