use sprs::{CsMat, TriMat};

use crate::basis::JacobianAssembler;
use crate::hyperparams::RmtValidParams;
use crate::linalg::accumulate_matrix;


/// This function returns the `dof × dof` diagonal matrix holding `reg_dv` on
/// every coefficient entry.
pub fn initialize_hessian(reg_dv: f64, dof: usize) -> CsMat<f64> {
    let mut tri = TriMat::with_capacity((dof, dof), dof);
    for i in 0..dof {
        tri.add_triplet(i, i, reg_dv);
    }
    tri.to_csr()
}

/// This function builds the regularized Hessian `H` of the fit objective:
/// the `reg_dv` diagonal, plus the curvature energy weighted by
/// `energy_weight` and the per-dimension smoothness when `min_energy` is set.
pub fn regularized_hessian<A: JacobianAssembler + ?Sized>(
    params: &RmtValidParams,
    assembler: &A,
) -> CsMat<f64> {
    let dof = assembler.num_coefficients();
    let diag = initialize_hessian(params.reg_dv(), dof);
    if !params.min_energy() || params.energy_weight() == 0. {
        return diag;
    }
    let energy = assembler.energy_hessian(&params.smoothness_per_dim());
    let mut tri = TriMat::with_capacity((dof, dof), dof + energy.nnz());
    accumulate_matrix(&mut tri, &diag, 1.);
    accumulate_matrix(&mut tri, &energy, params.energy_weight());
    tri.to_csr()
}
