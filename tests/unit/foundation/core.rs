use super::*;

#[test]
fn canvas_size_rejects_empty() {
    assert!(CanvasSize::new(0, 10).is_err());
    assert!(CanvasSize::new(10, 0).is_err());
    let s = CanvasSize::new(3, 2).unwrap();
    assert_eq!(s.rgba8_len(), 24);
}

#[test]
fn affine_length_gating() {
    assert!(AffineParams::new(vec![1.0, 0.0, 0.0, 1.0]).is_ok());
    assert!(AffineParams::new(vec![1.0, 0.0, 0.0, 1.0, 0.0, 0.0]).is_ok());
    for n in [0usize, 1, 2, 3, 5, 7, 9] {
        let err = AffineParams::new(vec![0.5; n]).unwrap_err();
        assert!(matches!(err, CompositorError::Argument(_)), "len {n}");
    }
}

#[test]
fn only_six_coefficients_produce_a_transform() {
    let four = AffineParams::new(vec![2.0, 0.0, 0.0, 2.0]).unwrap();
    assert!(four.transform().is_none());

    let six = AffineParams::new(vec![1.0, 0.0, 0.0, 1.0, 5.0, -3.0]).unwrap();
    let t = six.transform().unwrap();
    let p = t * Point::new(1.0, 1.0);
    assert_eq!((p.x, p.y), (6.0, -2.0));
}

#[test]
fn affine_rejects_non_finite() {
    assert!(AffineParams::new(vec![f64::NAN, 0.0, 0.0, 1.0]).is_err());
}

#[test]
fn affine_deserialize_validates_length() {
    let ok: AffineParams = serde_json::from_str("[1, 0, 0, 1, 0, 0]").unwrap();
    assert_eq!(ok.coeffs().len(), 6);
    assert!(serde_json::from_str::<AffineParams>("[1, 0, 0]").is_err());
}

#[test]
fn rgba8_alpha_defaults_to_opaque() {
    let c: Rgba8 = serde_json::from_str(r#"{"r":1,"g":2,"b":3}"#).unwrap();
    assert_eq!(c.to_array(), [1, 2, 3, 255]);
}
