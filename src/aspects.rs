// src/aspects.rs

use crate::{Aspect, AspectInfo, CelestialBody, PlanetPositions};

/// Maximum distance from a canonical angle that still counts as an aspect.
pub const ORB: f64 = 5.0;

/// Shorter arc between two longitudes, in [0, 180].
pub fn angular_separation(first: f64, second: f64) -> f64 {
    let difference = (first - second).abs();
    if difference > 180.0 {
        360.0 - difference
    } else {
        difference
    }
}

/// First canonical aspect (in `Aspect::ALL` order) within the orb, with the
/// orb actually observed. Not the closest one.
pub fn match_aspect(separation: f64) -> Option<(Aspect, f64)> {
    Aspect::ALL.iter().find_map(|&aspect| {
        let orb = (separation - aspect.angle()).abs();
        (orb < ORB).then_some((aspect, orb))
    })
}

/// Calculate aspects between every pair of known bodies.
///
/// Pairs are visited in canonical body order (`Sun`..`Pluto`, i < j) and the
/// result keeps that order, so identical positions always give an identical
/// list.
pub fn calculate_aspects(positions: &PlanetPositions) -> Vec<AspectInfo> {
    let planets: Vec<(CelestialBody, f64)> = positions.iter().map(|(&body, &lon)| (body, lon)).collect();
    let mut aspects = Vec::new();

    for (i, &(planet1, longitude1)) in planets.iter().enumerate() {
        for &(planet2, longitude2) in planets.iter().skip(i + 1) {
            let separation = angular_separation(longitude1, longitude2);
            if let Some((aspect, orb)) = match_aspect(separation) {
                aspects.push(AspectInfo {
                    aspect,
                    planet1,
                    planet2,
                    orb,
                });
            }
        }
    }

    aspects
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use pretty_assertions::assert_eq;

    fn positions(entries: &[(CelestialBody, f64)]) -> PlanetPositions {
        entries.iter().copied().collect()
    }

    fn summary(aspects: &[AspectInfo]) -> Vec<(CelestialBody, CelestialBody, Aspect)> {
        aspects.iter().map(|a| (a.planet1, a.planet2, a.aspect)).collect()
    }

    #[test]
    fn separation_wraps_around() {
        assert_abs_diff_eq!(angular_separation(355.0, 5.0), 10.0, epsilon = 1e-9);
        assert_abs_diff_eq!(angular_separation(5.0, 355.0), 10.0, epsilon = 1e-9);
        assert_abs_diff_eq!(angular_separation(10.0, 190.0), 180.0, epsilon = 1e-9);
    }

    #[test]
    fn wrapped_pair_is_a_conjunction() {
        let found = calculate_aspects(&positions(&[(CelestialBody::Sun, 358.0), (CelestialBody::Moon, 2.0)]));
        assert_eq!(summary(&found), vec![(CelestialBody::Sun, CelestialBody::Moon, Aspect::Conjunction)]);
        assert_abs_diff_eq!(found[0].orb, 4.0, epsilon = 1e-9);
    }

    #[test]
    fn ten_degree_separation_is_not_an_aspect() {
        let found = calculate_aspects(&positions(&[(CelestialBody::Sun, 355.0), (CelestialBody::Moon, 5.0)]));
        assert!(found.is_empty());
    }

    #[test]
    fn orb_boundary() {
        let inside = calculate_aspects(&positions(&[(CelestialBody::Sun, 0.0), (CelestialBody::Moon, 184.9)]));
        assert_eq!(summary(&inside), vec![(CelestialBody::Sun, CelestialBody::Moon, Aspect::Opposition)]);

        let outside = calculate_aspects(&positions(&[(CelestialBody::Sun, 0.0), (CelestialBody::Moon, 174.9)]));
        assert!(outside.is_empty());
    }

    #[test]
    fn exactly_five_degrees_does_not_match() {
        assert_eq!(match_aspect(65.0), None);
        assert_eq!(match_aspect(85.0), None);
    }

    #[test]
    fn first_canonical_angle_wins() {
        assert_eq!(match_aspect(62.0).map(|(aspect, _)| aspect), Some(Aspect::Sextile));
        assert_eq!(match_aspect(118.0).map(|(aspect, _)| aspect), Some(Aspect::Trine));
        assert_eq!(match_aspect(0.0).map(|(aspect, _)| aspect), Some(Aspect::Conjunction));
    }

    #[test]
    fn pairs_follow_canonical_order() {
        let chart = positions(&[
            (CelestialBody::Saturn, 190.0),
            (CelestialBody::Sun, 10.0),
            (CelestialBody::Venus, 100.0),
            (CelestialBody::Moon, 72.0),
        ]);
        let found = calculate_aspects(&chart);
        assert_eq!(
            summary(&found),
            vec![
                (CelestialBody::Sun, CelestialBody::Moon, Aspect::Sextile),
                (CelestialBody::Sun, CelestialBody::Venus, Aspect::Square),
                (CelestialBody::Sun, CelestialBody::Saturn, Aspect::Opposition),
                (CelestialBody::Moon, CelestialBody::Saturn, Aspect::Trine),
                (CelestialBody::Venus, CelestialBody::Saturn, Aspect::Square),
            ]
        );
    }

    #[test]
    fn detection_is_deterministic() {
        let chart = positions(&[
            (CelestialBody::Sun, 84.2),
            (CelestialBody::Moon, 266.0),
            (CelestialBody::Mercury, 70.1),
            (CelestialBody::Venus, 131.7),
            (CelestialBody::Jupiter, 101.3),
            (CelestialBody::Pluto, 225.9),
        ]);
        assert_eq!(calculate_aspects(&chart), calculate_aspects(&chart));
    }

    #[test]
    fn missing_body_produces_no_pairs() {
        let chart = positions(&[
            (CelestialBody::Sun, 0.0),
            (CelestialBody::Venus, 0.0),
            (CelestialBody::Jupiter, 90.0),
        ]);
        let found = calculate_aspects(&chart);
        assert_eq!(found.len(), 3);
        assert!(found
            .iter()
            .all(|a| a.planet1 != CelestialBody::Mars && a.planet2 != CelestialBody::Mars));
    }
}
