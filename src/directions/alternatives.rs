//! Alternative routes by iterative edge penalties.

use crate::route::{find_path, Departure, Path, Penalties, SearchLimits};
use crate::snap::Snap;
use crate::weighting::Weighting;

use super::AlternativeParams;

/// Multiplier applied to every edge of a found route before searching again
const PENALTY: f64 = 1.6;

/// The best path followed by up to `target_count - 1` alternatives.
///
/// An alternative is accepted when its unpenalized weight stays within
/// `weight_factor` of the best and it shares at most `share_factor` of its
/// distance with every route accepted before it.
pub(crate) fn find_alternatives(
    w: &Weighting,
    from: &Snap,
    to: &Snap,
    params: &AlternativeParams,
    limits: SearchLimits,
) -> Option<Vec<Path>> {
    let best = find_path(w, from, to, Departure::default(), None, limits)?;
    let max_weight = best.weight * params.weight_factor;
    let mut routes = vec![best];
    let mut penalties = Penalties::default();
    let penalize = |penalties: &mut Penalties, path: &Path| {
        for p in &path.pieces {
            *penalties.entry(p.edge).or_insert(1.0) *= PENALTY;
        }
    };
    penalize(&mut penalties, &routes[0]);

    for _ in 0..params.target_count * 3 {
        if routes.len() >= params.target_count {
            break;
        }
        let Some(candidate) = find_path(w, from, to, Departure::default(), Some(&penalties), limits) else {
            break;
        };
        penalize(&mut penalties, &candidate);
        if candidate.weight > max_weight {
            continue;
        }
        let overlapping = routes
            .iter()
            .any(|r| r.shared_distance(w, &candidate) > params.share_factor * candidate.distance);
        if overlapping {
            continue;
        }
        tracing::debug!(
            weight = candidate.weight,
            distance = candidate.distance,
            "accepted alternative route"
        );
        routes.push(candidate);
    }
    Some(routes)
}
