use std::collections::BTreeMap;
use std::sync::Arc;

use ndarray::Array1;
use sprs::CsMat;

use crate::basis::JacobianAssembler;
use crate::datasets::TrainingSet;
use crate::domain::DomainBounds;
use crate::error::{Result, RmtError};
use crate::linalg::transpose;


/// Jacobian of the training observations of one derivative order, with its
/// transpose.
#[derive(Debug, Clone)]
pub struct ApproxTerm {
    pub jac: Arc<CsMat<f64>>,
    pub jac_t: Arc<CsMat<f64>>,
}

/// Approximation terms of a fit, keyed by derivative order.
#[derive(Debug, Clone, Default)]
pub struct ApproxJacobianSet {
    terms: BTreeMap<usize, ApproxTerm>,
}

impl ApproxJacobianSet {
    /// This method builds the Jacobian of every derivative order present in
    /// `training`.
    ///
    /// All training points must lie in the closed domain; the first offending
    /// point is reported with its derivative order.
    pub fn build<A: JacobianAssembler + ?Sized>(
        training: &TrainingSet,
        assembler: &A,
        domain: &DomainBounds,
    ) -> Result<Self> {
        let nx = training.nx().ok_or(RmtError::EmptyTrainingSet)?;
        if nx != assembler.nx() {
            return Err(RmtError::DimensionMismatch {
                what: "training input dimension",
                expected: assembler.nx(),
                found: nx,
            });
        }
        let mut terms = BTreeMap::new();
        for (kx, xt, _) in training.iter() {
            let context = if kx == 0 {
                "training points of derivative order 0 (values)".to_string()
            } else {
                format!(
                    "training points of derivative order {} (d/dx{})",
                    kx,
                    kx - 1
                )
            };
            domain.check_points(xt, &context)?;
            let jac = assembler.compute_jac(kx, 0, xt);
            let jac_t = transpose(&jac);
            terms.insert(
                kx,
                ApproxTerm {
                    jac: Arc::new(jac),
                    jac_t: Arc::new(jac_t),
                },
            );
        }
        Ok(ApproxJacobianSet { terms })
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn get(&self, kx: usize) -> Option<&ApproxTerm> {
        self.terms.get(&kx)
    }

    /// Iterates over `(order, term)` by increasing derivative order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &ApproxTerm)> {
        self.terms.iter().map(|(&kx, term)| (kx, term))
    }

    /// This method slices the targets of output column `iy` for every term,
    /// in the iteration order of [`ApproxJacobianSet::iter`].
    pub fn targets(&self, training: &TrainingSet, iy: usize) -> Result<Vec<Array1<f64>>> {
        let ny = training.ny().ok_or(RmtError::EmptyTrainingSet)?;
        if iy >= ny {
            return Err(RmtError::DimensionMismatch {
                what: "output column",
                expected: ny,
                found: iy,
            });
        }
        self.terms
            .keys()
            .map(|&kx| {
                training
                    .get(kx)
                    .map(|(_, yt)| yt.column(iy).to_owned())
                    .ok_or(RmtError::DimensionMismatch {
                        what: "training derivative orders",
                        expected: self.terms.len(),
                        found: kx,
                    })
            })
            .collect()
    }
}
