//! Route difficulty: orders graded holds, scores every move between
//! consecutive holds and blends the result with the average hold grade.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    config::{HoldsConfig, PixelScale, RouteConfig},
    types::{HoldType, RouteHold, RouteOutcome, RouteScore},
};

/// Everything needed to grade one route.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RouteRequest {
    pub holds: Vec<RouteHold>,
    /// Hold the climb starts from; holds are then ordered by distance to it
    #[serde(default)]
    pub start_hold: Option<String>,
    /// Informational only
    #[serde(default)]
    pub end_hold: Option<String>,
    /// Wall angle in degrees, the configured default when absent
    #[serde(default)]
    pub wall_angle: Option<f64>,
}

/// Score components of a single move.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MoveScore {
    pub distance_cm: f64,
    pub angle_deg: f64,
    pub static_score: f64,
    pub dynamic_bonus: f64,
    pub angle_score: f64,
    pub type_modifier: f64,
    pub height_score: f64,
    pub wall_score: f64,
    pub difficulty: f64,
}

#[derive(Debug, Clone, Default)]
pub struct RouteAssembler {
    pub config: RouteConfig,
    pub scale: PixelScale,
}

impl RouteAssembler {
    pub fn new(config: RouteConfig, scale: PixelScale) -> Self {
        Self { config, scale }
    }

    pub fn from_config(config: &HoldsConfig) -> Self {
        Self::new(config.route.clone(), config.scale)
    }

    pub fn distance_cm(&self, a: [i32; 2], b: [i32; 2]) -> f64 {
        let dx = self.scale.to_cm((b[0] - a[0]) as f64);
        let dy = self.scale.to_cm((b[1] - a[1]) as f64);
        dx.hypot(dy)
    }

    /// Absolute direction of the move in degrees, `[0, 180]`.
    pub fn angle_deg(a: [i32; 2], b: [i32; 2]) -> f64 {
        let dx = (b[0] - a[0]) as f64;
        let dy = (b[1] - a[1]) as f64;
        dy.atan2(dx).to_degrees().abs()
    }

    /// Holds in climbing order: by distance from the start hold when one is
    /// designated and present, otherwise top-down by pixel row.
    pub fn order(&self, holds: &[RouteHold], start_hold: Option<&str>) -> Vec<RouteHold> {
        let mut ordered = holds.to_vec();
        let start = start_hold.and_then(|id| holds.iter().find(|h| h.id == id));
        match start {
            Some(start) => {
                let origin = start.center;
                ordered.sort_by(|a, b| {
                    self.distance_cm(origin, a.center)
                        .total_cmp(&self.distance_cm(origin, b.center))
                });
            }
            None => ordered.sort_by_key(|h| h.center[1]),
        }
        ordered
    }

    /// Reach tiers: static up to the static reach, dynamic up to the dynamic
    /// reach, flat maximum beyond. Returns `(static_score, dynamic_bonus)`.
    pub fn reach_score(&self, distance_cm: f64) -> (f64, f64) {
        let c = &self.config;
        if distance_cm <= c.max_static_reach_cm {
            (distance_cm / c.max_static_reach_cm * c.static_reach_score, 0.0)
        } else if distance_cm <= c.max_dynamic_reach_cm {
            let span = c.max_dynamic_reach_cm - c.max_static_reach_cm;
            (
                c.static_reach_score + (distance_cm - c.max_static_reach_cm) / span * c.dynamic_reach_score,
                c.dynamic_bonus,
            )
        } else {
            (c.static_reach_score + c.dynamic_reach_score, c.out_of_reach_bonus)
        }
    }

    pub fn type_modifier(&self, from: HoldType, to: HoldType) -> f64 {
        match (from, to) {
            (HoldType::Handhold, HoldType::Handhold) => self.config.handhold_pair_modifier,
            (HoldType::Foothold, HoldType::Foothold) => self.config.foothold_pair_modifier,
            _ => self.config.mixed_pair_modifier,
        }
    }

    /// Difficulty of moving `from` → `to`. Height gain is measured against
    /// `first`, the first hold of the whole sequence.
    pub fn score_move(&self, from: &RouteHold, to: &RouteHold, first: &RouteHold, wall_angle: f64) -> MoveScore {
        let c = &self.config;
        let distance_cm = self.distance_cm(from.center, to.center);
        let angle_deg = Self::angle_deg(from.center, to.center);
        let (static_score, dynamic_bonus) = self.reach_score(distance_cm);
        let angle_score = angle_deg / 180.0 * c.angle_weight;
        let type_modifier = self.type_modifier(from.hold_type, to.hold_type);
        let height_cm = self.scale.to_cm((to.center[1] - first.center[1]) as f64).max(0.0);
        let height_score = height_cm / c.height_span_cm * c.height_weight;
        let wall_score = wall_angle / c.wall_span_deg * c.wall_weight;
        let difficulty =
            (static_score + angle_score) * type_modifier + height_score + wall_score + dynamic_bonus;

        MoveScore {
            distance_cm,
            angle_deg,
            static_score,
            dynamic_bonus,
            angle_score,
            type_modifier,
            height_score,
            wall_score,
            difficulty,
        }
    }

    /// First bucket containing the total; the lowest label otherwise.
    pub fn grade_label(&self, total: f64) -> String {
        let table = &self.config.grade_table;
        table
            .iter()
            .find(|bucket| bucket.contains(total))
            .or_else(|| table.first())
            .map_or_else(|| "V0".to_string(), |bucket| bucket.label.clone())
    }

    pub fn assemble(&self, request: &RouteRequest) -> RouteOutcome {
        if request.holds.is_empty() {
            info!("No holds to grade");
            return RouteOutcome::NotApplicable;
        }
        let wall_angle = request.wall_angle.unwrap_or(self.config.default_wall_angle);
        let holds = self.order(&request.holds, request.start_hold.as_deref());

        let average_grade =
            holds.iter().map(|h| h.grade as f64).sum::<f64>() / holds.len() as f64;
        let hold_component = average_grade * self.config.hold_component_scale;

        let first = &holds[0];
        let moves: Vec<MoveScore> = holds
            .windows(2)
            .map(|pair| self.score_move(&pair[0], &pair[1], first, wall_angle))
            .collect();
        let move_component = if moves.is_empty() {
            0.0
        } else {
            moves.iter().map(|m| m.difficulty).sum::<f64>() / moves.len() as f64
                * self.config.move_component_scale
        };

        let total = hold_component + move_component;
        let grade = self.grade_label(total);
        debug!(?moves, "Scored moves");
        info!(
            holds = holds.len(),
            start_hold = ?request.start_hold,
            end_hold = ?request.end_hold,
            average_grade,
            hold_component,
            move_component,
            total,
            %grade,
            "Graded route"
        );

        RouteOutcome::Graded(RouteScore {
            hold_component,
            move_component,
            total,
            grade,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GradeBucket;

    fn hold(id: &str, x: i32, y: i32, hold_type: HoldType, grade: u8) -> RouteHold {
        RouteHold {
            id: id.to_string(),
            center: [x, y],
            hold_type,
            grade,
        }
    }

    fn half_cm_assembler() -> RouteAssembler {
        RouteAssembler::new(RouteConfig::default(), PixelScale { cm_per_px: 0.5 })
    }

    fn total(outcome: &RouteOutcome) -> f64 {
        outcome.score().expect("graded").total
    }

    #[test]
    fn test_empty_route_is_not_applicable() {
        let outcome = RouteAssembler::default().assemble(&RouteRequest::default());
        assert_eq!(outcome, RouteOutcome::NotApplicable);
        assert_eq!(outcome.grade_label(), "N/A");
    }

    #[test]
    fn test_single_hold_has_no_move_component() {
        let request = RouteRequest {
            holds: vec![hold("a", 10, 10, HoldType::Handhold, 4)],
            ..Default::default()
        };
        let score = RouteAssembler::default().assemble(&request);
        let score = score.score().expect("graded");
        assert_eq!(score.move_component, 0.0);
        assert_eq!(score.hold_component, 10.0);
        assert_eq!(score.grade, "V1");
    }

    #[test]
    fn test_two_handholds_ninety_cm_apart() {
        let assembler = half_cm_assembler();
        // 180 px at 0.5 cm/px straight up the image
        let a = hold("a", 0, 0, HoldType::Handhold, 4);
        let b = hold("b", 0, 180, HoldType::Handhold, 6);

        let m = assembler.score_move(&a, &b, &a, 20.0);
        assert!((m.distance_cm - 90.0).abs() < 1e-9);
        assert!((m.static_score - 20.0).abs() < 1e-9);
        assert_eq!(m.dynamic_bonus, 0.0);
        assert!((m.angle_deg - 90.0).abs() < 1e-9);
        assert!((m.angle_score - 10.0).abs() < 1e-9);
        assert_eq!(m.type_modifier, 1.5);
        assert!((m.height_score - 9.0).abs() < 1e-9);
        assert!((m.wall_score - 20.0 / 45.0 * 15.0).abs() < 1e-9);
        let expected_move = (20.0 + 10.0) * 1.5 + 9.0 + 20.0 / 45.0 * 15.0;
        assert!((m.difficulty - expected_move).abs() < 1e-9);

        let request = RouteRequest {
            holds: vec![b.clone(), a.clone()],
            wall_angle: Some(20.0),
            ..Default::default()
        };
        let outcome = assembler.assemble(&request);
        let score = outcome.score().expect("graded");
        assert!((score.hold_component - 12.5).abs() < 1e-9);
        assert!((score.move_component - expected_move * 0.6).abs() < 1e-9);
        assert!((score.total - (12.5 + expected_move * 0.6)).abs() < 1e-9);
        assert_eq!(score.grade, "V6");
    }

    #[test]
    fn test_reach_tiers() {
        let assembler = RouteAssembler::default();
        assert_eq!(assembler.reach_score(45.0), (10.0, 0.0));
        let (s, bonus) = assembler.reach_score(97.5);
        assert!((s - 35.0).abs() < 1e-9);
        assert_eq!(bonus, 5.0);
        assert_eq!(assembler.reach_score(105.0), (50.0, 5.0));
        assert_eq!(assembler.reach_score(140.0), (50.0, 10.0));
    }

    #[test]
    fn test_mixed_pair_modifier() {
        let assembler = RouteAssembler::default();
        assert_eq!(assembler.type_modifier(HoldType::Handhold, HoldType::Foothold), 1.0);
        assert_eq!(assembler.type_modifier(HoldType::Foothold, HoldType::Foothold), 1.3);
    }

    #[test]
    fn test_height_is_measured_from_first_hold() {
        let assembler = half_cm_assembler();
        let first = hold("a", 0, 0, HoldType::Handhold, 5);
        let second = hold("b", 0, 100, HoldType::Handhold, 5);
        let third = hold("c", 0, 200, HoldType::Handhold, 5);

        let m = assembler.score_move(&second, &third, &first, 0.0);
        // 200 px from the first hold, not 100 px from the previous one
        assert!((m.height_score - 100.0 / 200.0 * 20.0).abs() < 1e-9);

        let upward = assembler.score_move(&third, &first, &third, 0.0);
        assert_eq!(upward.height_score, 0.0);
    }

    #[test]
    fn test_order_without_start_uses_raw_rows() {
        let assembler = RouteAssembler::default();
        let holds = vec![
            hold("low", 0, 300, HoldType::Handhold, 1),
            hold("high", 50, 10, HoldType::Handhold, 1),
            hold("mid", 900, 150, HoldType::Handhold, 1),
        ];
        let ids: Vec<String> = assembler.order(&holds, None).into_iter().map(|h| h.id).collect();
        assert_eq!(ids, vec!["high", "mid", "low"]);

        let unknown: Vec<String> =
            assembler.order(&holds, Some("missing")).into_iter().map(|h| h.id).collect();
        assert_eq!(unknown, ids);
    }

    #[test]
    fn test_order_from_start_hold_by_distance() {
        let assembler = RouteAssembler::default();
        let holds = vec![
            hold("far", 0, 0, HoldType::Handhold, 1),
            hold("start", 500, 500, HoldType::Handhold, 1),
            hold("near", 450, 200, HoldType::Handhold, 1),
        ];
        let ids: Vec<String> =
            assembler.order(&holds, Some("start")).into_iter().map(|h| h.id).collect();
        assert_eq!(ids, vec!["start", "near", "far"]);
    }

    #[test]
    fn test_total_grows_with_hold_grades() {
        let assembler = RouteAssembler::default();
        let route = |grade: u8| RouteRequest {
            holds: vec![
                hold("a", 100, 900, HoldType::Foothold, grade),
                hold("b", 180, 600, HoldType::Handhold, grade),
                hold("c", 120, 300, HoldType::Handhold, grade),
            ],
            ..Default::default()
        };
        let mut previous = f64::MIN;
        for grade in 1..=10 {
            let t = total(&assembler.assemble(&route(grade)));
            assert!(t >= previous);
            previous = t;
        }
    }

    #[test]
    fn test_grade_table_lookup_and_fallback() {
        let assembler = RouteAssembler::default();
        assert_eq!(assembler.grade_label(0.0), "V0");
        assert_eq!(assembler.grade_label(9.99), "V0");
        assert_eq!(assembler.grade_label(10.0), "V1");
        assert_eq!(assembler.grade_label(74.9), "V8");
        assert_eq!(assembler.grade_label(500.0), "V9+");
        assert_eq!(assembler.grade_label(-3.0), "V0");

        let custom = RouteAssembler::new(
            RouteConfig {
                grade_table: vec![
                    GradeBucket::new(0.0, Some(50.0), "easy"),
                    GradeBucket::new(50.0, None, "hard"),
                ],
                ..RouteConfig::default()
            },
            PixelScale::default(),
        );
        assert_eq!(custom.grade_label(51.0), "hard");
    }

    #[test]
    fn test_assembly_is_deterministic() {
        let assembler = RouteAssembler::default();
        let request = RouteRequest {
            holds: vec![
                hold("a", 120, 800, HoldType::Foothold, 3),
                hold("b", 300, 420, HoldType::Handhold, 7),
                hold("c", 260, 90, HoldType::Handhold, 5),
            ],
            start_hold: Some("a".to_string()),
            end_hold: Some("c".to_string()),
            wall_angle: Some(30.0),
        };
        assert_eq!(assembler.assemble(&request), assembler.assemble(&request));
    }
}
