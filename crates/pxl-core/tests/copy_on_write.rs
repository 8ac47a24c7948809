//! Sharing, detaching and ownership transfer across image handles.

use pxl_core::prelude::*;

#[test]
fn test_clone_shares_until_written() {
    let a = Image::<u16>::filled(32, 32, 3, ColorSpace::Rgb, 100);
    let mut b = a.clone();
    assert_eq!(a.ref_count(), 2);

    b.set_sample(0, 0, 0, 7).unwrap();
    assert!(!b.shares_buffer_with(&a));
    assert_eq!(a.sample(0, 0, 0), Some(100));
    assert_eq!(b.sample(0, 0, 0), Some(7));
    assert_eq!(a.ref_count(), 1);
}

#[test]
fn test_ensure_unique_is_idempotent() {
    let a = Image::<f32>::filled(4, 4, 1, ColorSpace::Gray, 0.5);
    let mut b = a.clone();
    b.ensure_unique().unwrap();
    let id = b.buffer_id();
    b.ensure_unique().unwrap();
    assert_eq!(b.buffer_id(), id);
    assert!(b.is_unique());
}

#[test]
fn test_selection_is_per_handle() {
    let mut a = Image::<u8>::filled(10, 10, 1, ColorSpace::Gray, 0);
    let b = a.clone();
    a.select_rectangle(Rect::new(2, 2, 3, 3));
    assert_eq!(b.selected_rectangle(), b.bounds());
    // Selection changes never detach the buffer.
    assert!(a.shares_buffer_with(&b));
}

#[test]
fn test_selection_stack_round_trip() {
    let mut img = Image::<u8>::filled(10, 10, 3, ColorSpace::Rgb, 0);
    img.select_rectangle(Rect::new(1, 1, 4, 4));
    img.push_selections();
    img.select_channel(2);
    img.reset_selection();
    assert!(img.pop_selections());
    assert_eq!(img.selected_rectangle(), Rect::new(1, 1, 4, 4));
    assert!(!img.pop_selections());
}

#[test]
fn test_subset_of_shared_image() {
    let mut a = Image::<f64>::filled(8, 8, 1, ColorSpace::Gray, 0.25);
    let b = a.clone();
    a.select_rectangle(Rect::new(4, 4, 4, 4));
    let sub = a.selected_subset();
    assert_eq!((sub.width(), sub.height()), (4, 4));
    assert!(!sub.shares_buffer_with(&b));
    assert!(a.shares_buffer_with(&b));
}
