use std::time::Duration;

use super::*;
use crate::assets::resource::MemoryResource;

fn res(name: &str) -> Resource {
    Resource::new(MemoryResource::new(name, Vec::new(), 1))
}

#[test]
fn collector_tags_insertion_index_and_defaults_params() {
    let (mut c, rx) = PartsCollector::channel();
    c.set_size(8, 6);
    c.add(Layer::new("a", 1), res("a"), None);
    c.add(
        Layer::new("b", 0),
        res("b"),
        Some(ColorParams {
            hue: 0.5,
            ..ColorParams::default()
        }),
    );
    assert_eq!(c.len(), 2);
    c.complete();

    let info = rx.recv().unwrap().into_build_info().unwrap();
    assert_eq!(info.size(), CanvasSize::new(8, 6).unwrap());
    let parts = info.parts();
    assert_eq!(parts[0].resource.id(), "mem:b");
    assert_eq!(parts[0].index, 1);
    assert_eq!(parts[1].index, 0);
    assert_eq!(parts[1].params, ColorParams::default());
}

#[test]
fn set_affine_rejects_bad_lengths_immediately() {
    let (mut c, rx) = PartsCollector::channel();
    c.set_size(1, 1);
    c.set_affine(Some(vec![1.0, 0.0, 0.0, 1.0])).unwrap();
    let err = c.set_affine(Some(vec![1.0; 5])).unwrap_err();
    assert!(matches!(err, CompositorError::Argument(_)));
    c.complete();

    let info = rx.recv().unwrap().into_build_info().unwrap();
    assert_eq!(info.affine().unwrap().coeffs().len(), 4);
}

#[test]
fn missing_or_empty_size_is_an_argument_error() {
    let (c, rx) = PartsCollector::channel();
    c.complete();
    let err = rx.recv().unwrap().into_build_info().unwrap_err();
    assert!(matches!(err, CompositorError::Argument(_)));

    let (mut c, rx) = PartsCollector::channel();
    c.set_size(0, 3);
    c.complete();
    assert!(rx.recv().unwrap().into_build_info().is_err());
}

#[test]
fn dropping_the_collector_disconnects() {
    let (c, rx) = PartsCollector::channel();
    drop(c);
    assert!(matches!(
        rx.recv_timeout(Duration::from_millis(10)),
        Err(mpsc::RecvTimeoutError::Disconnected)
    ));
}

#[test]
fn collector_can_complete_from_another_thread() {
    let (mut c, rx) = PartsCollector::channel();
    let h = std::thread::spawn(move || {
        c.set_size(2, 2);
        c.add(Layer::new("a", 0), res("a"), None);
        c.complete();
    });
    let info = rx
        .recv_timeout(Duration::from_secs(5))
        .unwrap()
        .into_build_info()
        .unwrap();
    h.join().unwrap();
    assert_eq!(info.parts().len(), 1);
}
