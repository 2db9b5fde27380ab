//! End-to-end label placement behavior.

use termatlas::{LabelPlacer, Settings};

fn placer() -> LabelPlacer<u32> {
    LabelPlacer::new(&Settings::default())
}

#[test]
fn test_overlapping_label_is_rejected() {
    let mut labels = placer();

    assert!(labels.write_if_possible("Berlin", 100, 100, 1, None));
    assert!(!labels.write_if_possible("Berlin2", 100, 100, 2, None));

    // Exactly one rectangle committed.
    assert_eq!(labels.len(), 1);
    let (gx, gy) = LabelPlacer::<u32>::project(100, 100);
    let features: Vec<u32> = labels.features_at(gx, gy).map(|l| *l.feature()).collect();
    assert_eq!(features, vec![1]);
}

#[test]
fn test_clear_starts_a_fresh_cycle() {
    let mut labels = placer();

    assert!(labels.write_if_possible("Berlin", 100, 100, 1, None));
    assert!(!labels.write_if_possible("Berlin", 100, 100, 2, None));

    labels.clear();

    // The identical placement succeeds again; nothing lingers.
    assert!(labels.write_if_possible("Berlin", 100, 100, 2, None));
    assert_eq!(labels.len(), 1);
}

#[test]
fn test_hit_testing() {
    let mut labels = placer();
    assert!(labels.write_if_possible("Berlin", 100, 100, 7, None));

    let (gx, gy) = LabelPlacer::<u32>::project(100, 100);

    // Inside the placed rectangle.
    let inside: Vec<u32> = labels.features_at(gx, gy).map(|l| *l.feature()).collect();
    assert_eq!(inside, vec![7]);

    // Strictly outside every rectangle.
    assert_eq!(labels.features_at(gx + 100, gy).count(), 0);
    assert_eq!(labels.features_at(gx, gy + 100).count(), 0);
}

#[test]
fn test_full_render_cycle() {
    let mut labels = placer();

    // First cycle: a city cluster where only some labels fit.
    labels.clear();
    let placed: Vec<bool> = [
        ("Berlin", 200, 120),
        ("Potsdam", 204, 122),  // too close, rejected
        ("Hamburg", 60, 40),
        ("Leipzig", 210, 260),
    ]
    .iter()
    .enumerate()
    .map(|(i, &(name, x, y))| labels.write_if_possible(name, x, y, i as u32, None))
    .collect();

    assert_eq!(placed, vec![true, false, true, true]);
    assert_eq!(labels.len(), 3);

    // Next cycle: the viewport moved, everything replays from scratch.
    labels.clear();
    assert!(labels.write_if_possible("Potsdam", 204, 122, 9, None));
}
