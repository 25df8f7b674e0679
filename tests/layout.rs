use calosim::core::{map_position, CellGrid, CellKey, Geometry, LayoutParams};
use calosim::error::{Error, Result};

/// Stack closure: for a range of valid layouts the trailing face equals
/// z_min + N * layer_thickness and every derived extent is positive.
#[test]
fn stack_extent_closes_for_valid_layouts() -> Result<()> {
    for n_layers in [1usize, 2, 7, 26, 100] {
        for (absorber, sensitive, gap) in [(3.5, 0.3, 1.7), (1.0, 1.0, 1.0), (10.0, 0.05, 0.0001)] {
            let params = LayoutParams {
                absorber,
                sensitive,
                gap,
                n_layers,
                z_min: -12.5,
                ..LayoutParams::default()
            };
            let g = Geometry::new(params, CellGrid::new(3, 5))?;
            let expected = g.z_min() + n_layers as f64 * g.layer_thickness();
            assert!(
                (g.z_max() - expected).abs() < 1e-9,
                "z_max {} != {} for N={}",
                g.z_max(),
                expected,
                n_layers
            );
            assert!(g.layer_thickness() > 0.0 && g.stack_z() > 0.0);
            assert!(g.cell_pitch_x() > 0.0 && g.cell_pitch_y() > 0.0);
            assert!(g.source_z() <= g.z_min());
        }
    }
    Ok(())
}

/// Every sensitive-slab centre of every cell maps back to that cell.
#[test]
fn cell_centres_map_to_their_own_bin() -> Result<()> {
    let params = LayoutParams {
        n_layers: 4,
        width_x: 100.0,
        width_y: 60.0,
        ..LayoutParams::default()
    };
    let g = Geometry::new(params, CellGrid::new(10, 6))?;
    for layer in 0..g.n_layers() {
        let (lo, hi) = g.sensitive_range(layer);
        let z = 0.5 * (lo + hi);
        for cx in 0..10u32 {
            for cy in 0..6u32 {
                let x = -50.0 + (f64::from(cx) + 0.5) * g.cell_pitch_x();
                let y = -30.0 + (f64::from(cy) + 0.5) * g.cell_pitch_y();
                let key = map_position([x, y, z], &g)?;
                assert_eq!(key, CellKey::new(layer as u32, cx, cy));
            }
        }
    }
    Ok(())
}

/// Positions just outside the stack in any direction are fatal.
#[test]
fn positions_outside_stack_are_rejected() -> Result<()> {
    let g = Geometry::new(LayoutParams::default(), CellGrid::new(2, 2))?;
    let outside = [
        [0.0, 0.0, g.z_min() - 0.01],
        [0.0, 0.0, g.z_max() + 0.01],
        [-505.01, 0.0, 3.6],
        [0.0, 505.0, 3.6],
    ];
    for p in outside {
        let err = map_position(p, &g).unwrap_err();
        assert!(
            matches!(err, Error::OutOfBoundsDeposit { .. }),
            "expected out-of-bounds for {:?}, got {}",
            p,
            err
        );
    }
    Ok(())
}
