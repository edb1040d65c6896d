use std::f32::consts::{FRAC_PI_2, FRAC_PI_4, PI};

use float_eq::assert_float_eq;
use ndarray::{Array2, Array3};
use ndarray_rand::{RandomExt, rand_distr::Uniform};
use proptest::prelude::*;
use rand::SeedableRng;
use rand_core::RngCore;
use rand_isaac::Isaac64Rng;

use units::mm;
use vcdtomo::{
    batch::{ExecutionContext, Placement},
    geometry::{GeometryParams, ProjectorParams},
    model::TomographyModel,
    partition::{partition, Strategy},
    projector::{ParallelBeam, back_project_batch, forward_project_batch},
};

fn model(
    sinogram_shape: [usize; 3],
    recon_shape   : [usize; 3],
    delta_channel : f32,
    offset        : f32,
    delta_voxel   : f32,
    angles        : Vec<f32>,
    placement     : Placement,
) -> TomographyModel {
    let geometry = GeometryParams::new(mm(delta_channel), mm(offset), mm(delta_voxel)).unwrap();
    let params = ProjectorParams::new(sinogram_shape, recon_shape, geometry).unwrap();
    let execution = ExecutionContext::new(placement, 2, 7).unwrap();
    TomographyModel::new(params, angles, execution).unwrap()
}

// ⟨A x, y⟩ = ⟨x, Aᵀ y⟩ over whole sinograms, for subsets of pixels taken
// from random partitions
proptest! {
    #[test]
    fn sparse_projections_are_adjoint(
        size          in 3..14_usize,
        slices        in 1..3_usize,
        channels      in 3..24_usize,
        delta_channel in 0.5..(1.5 as f32),
        delta_voxel   in 0.5..(1.5 as f32),
        offset        in -2.0..(2.0 as f32),
        num_subsets   in 1..5_usize,
        seed          in 0..1000_u64,
    ) {
        let angles = vec![0.0, FRAC_PI_4, FRAC_PI_2, 2.0, PI];
        let m = model([5, slices, channels], [size, size, slices], delta_channel, offset, delta_voxel,
                      angles, Placement::Serial);
        let mut rng = Isaac64Rng::seed_from_u64(seed);
        let p = partition([size, size, slices], num_subsets, Strategy::Balanced, true, &mut rng).unwrap();
        let subset = p.subset(rng.next_u32() as usize % p.num_subsets());

        let x = Array2::random_using((subset.len(), slices), Uniform::new(-1.0, 1.0), &mut rng);
        let y = Array3::random_using((5, slices, channels), Uniform::new(-1.0, 1.0), &mut rng);
        let ax  = m.sparse_forward_project(x.view(), subset).unwrap();
        let aty = m.sparse_back_project(y.view(), subset, 1).unwrap();

        let lhs = (&ax * &y).sum();
        let rhs = (&x * &aty).sum();
        let scale = ax.iter().map(|v| v.abs()).sum::<f32>().max(1.0);
        prop_assert!((lhs - rhs).abs() <= 1e-5 * scale, "{lhs} vs {rhs}");
    }
}

#[test]
fn single_view_entry_points_are_adjoint() {
    let m = model([1, 2, 11], [7, 7, 2], 1.0, 0.4, 1.3, vec![0.0], Placement::Serial);
    let mut rng = Isaac64Rng::seed_from_u64(17);
    let pixels: Vec<usize> = (0..49).collect();
    for angle in [0.0, FRAC_PI_4, FRAC_PI_2, 3.0] {
        let v = Array2::random_using((49, 2), Uniform::new(0.0, 1.0), &mut rng);
        let s = Array2::random_using((2, 11), Uniform::new(0.0, 1.0), &mut rng);
        let av  = forward_project_batch::<ParallelBeam>(v.view(), &pixels, angle, m.params()).unwrap();
        let ats = back_project_batch::<ParallelBeam>(s.view(), &pixels, angle, m.params(), 1).unwrap();
        assert_float_eq!((&av * &s).sum(), (&v * &ats).sum(), rmax <= 1e-5);
    }
}

// A single voxel at the centre of the volume projects onto the centre channel
// at 0 and π/2, and back projection puts the peak back at the centre.
#[test]
fn centre_voxel_end_to_end() {
    let m = model([2, 1, 9], [9, 9, 1], 1.0, 0.0, 1.0, vec![0.0, FRAC_PI_2], Placement::Threads(2));
    let radius = m.params().geometry.psf_radius;
    let mut volume = Array3::<f32>::zeros((9, 9, 1));
    volume[[4, 4, 0]] = 1.0;

    let sinogram = m.forward_project(volume.view()).unwrap();
    for view in sinogram.outer_iter() {
        // All the energy is in the band around the centre channel
        let total: f32 = view.sum();
        let band: f32 = (4 - radius ..= 4 + radius).map(|n| view[[0, n]]).sum();
        assert_float_eq!(total, 1.0, abs <= 1e-6);
        assert_float_eq!(band, total, abs <= 1e-6);
        let peak = view.row(0).iter().enumerate()
            .fold((0, f32::MIN), |best, (n, &x)| if x > best.1 { (n, x) } else { best });
        assert_eq!(peak.0, 4);
    }

    let back = m.back_project(sinogram.view()).unwrap();
    let (peak, value) = back.indexed_iter()
        .fold(((0, 0, 0), f32::MIN), |best, (ijk, &x)| if x > best.1 { (ijk, x) } else { best });
    assert_eq!(peak, (4, 4, 0));
    assert_float_eq!(value, 2.0, abs <= 1e-6);
    // The peak is unique: other pixels see the voxel in at most one view
    assert_eq!(back.iter().filter(|&&x| x > 1.5).count(), 1);
}
