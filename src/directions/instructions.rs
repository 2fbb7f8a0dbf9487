//! Turn-by-turn steps for one route segment.

use serde::Serialize;
use utoipa::ToSchema;

use super::request::{round_to, InstructionsFormat, Language, Units};
use super::Track;
use crate::geo::bearing;
use crate::graph::RouteGraph;
use crate::weighting::Weighting;

pub const TURN_LEFT: u8 = 0;
pub const TURN_RIGHT: u8 = 1;
pub const TURN_SHARP_LEFT: u8 = 2;
pub const TURN_SHARP_RIGHT: u8 = 3;
pub const TURN_SLIGHT_LEFT: u8 = 4;
pub const TURN_SLIGHT_RIGHT: u8 = 5;
pub const CONTINUE: u8 = 6;
pub const ENTER_ROUNDABOUT: u8 = 7;
pub const EXIT_ROUNDABOUT: u8 = 8;
pub const U_TURN: u8 = 9;
pub const GOAL: u8 = 10;
pub const DEPART: u8 = 11;
pub const KEEP_LEFT: u8 = 12;
pub const KEEP_RIGHT: u8 = 13;

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Maneuver {
    #[schema(value_type = Vec<f64>)]
    pub location: [f64; 2],
    pub bearing_before: u32,
    pub bearing_after: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Step {
    pub distance: f64,
    pub duration: f64,
    #[serde(rename = "type")]
    pub step_type: u8,
    pub instruction: String,
    pub name: String,
    #[schema(value_type = Vec<usize>)]
    pub way_points: [usize; 2],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_number: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_bearings: Option<Vec<u32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maneuver: Option<Maneuver>,
}

pub(crate) struct InstructionOptions {
    pub language: Language,
    pub format: InstructionsFormat,
    pub units: Units,
    pub maneuvers: bool,
    pub roundabout_exits: bool,
}

/// Signed turn angle in (-180, 180], positive to the right.
fn turn_angle(before: f64, after: f64) -> f64 {
    let d = (after - before).rem_euclid(360.0);
    if d > 180.0 {
        d - 360.0
    } else {
        d
    }
}

fn classify(angle: f64) -> u8 {
    let a = angle.abs();
    let right = angle > 0.0;
    match a {
        a if a < 20.0 => CONTINUE,
        a if a < 50.0 => {
            if right {
                TURN_SLIGHT_RIGHT
            } else {
                TURN_SLIGHT_LEFT
            }
        }
        a if a < 125.0 => {
            if right {
                TURN_RIGHT
            } else {
                TURN_LEFT
            }
        }
        a if a < 170.0 => {
            if right {
                TURN_SHARP_RIGHT
            } else {
                TURN_SHARP_LEFT
            }
        }
        _ => U_TURN,
    }
}

struct PendingStep {
    step_type: u8,
    start: usize,
    name: Option<String>,
    distance: f64,
    duration: f64,
    exit_number: Option<u32>,
    exit_bearings: Vec<u32>,
    bearing_before: f64,
    bearing_after: f64,
}

impl PendingStep {
    fn new(step_type: u8, start: usize, name: Option<String>, bearing_before: f64, bearing_after: f64) -> Self {
        Self {
            step_type,
            start,
            name,
            distance: 0.0,
            duration: 0.0,
            exit_number: None,
            exit_bearings: Vec::new(),
            bearing_before,
            bearing_after,
        }
    }
}

struct StepBuilder<'a, 'w> {
    graph: &'a RouteGraph,
    w: &'a Weighting<'w>,
    track: &'a Track,
    opts: &'a InstructionOptions,
}

impl StepBuilder<'_, '_> {
    fn name(&self, span: usize) -> Option<String> {
        let edge = self.track.spans[span].edge?;
        self.graph.way_of(edge).display_name().map(str::to_string)
    }

    fn roundabout(&self, span: usize) -> bool {
        self.track.spans[span]
            .edge
            .is_some_and(|e| self.graph.way_of(e).attrs.roundabout)
    }

    fn span_bearing(&self, span: usize) -> f64 {
        bearing(self.track.points[span], self.track.points[span + 1])
    }

    /// Graph node at the end of `span`, if it ends on one
    fn node_after(&self, span: usize) -> Option<u32> {
        let s = &self.track.spans[span];
        let edge = s.edge?;
        Some(self.graph.endpoints(edge, s.reverse).1)
    }

    /// Bearings of usable edges leaving `node`, other than `skip`
    fn other_exits(&self, node: u32, skip: &[u32], roundabout: bool) -> Vec<f64> {
        let here = self.graph.coord(node);
        self.graph
            .incident(node)
            .iter()
            .filter(|e| !skip.contains(e))
            .filter(|&&e| {
                let reverse = self.graph.edges[e as usize].to == node;
                self.w.accessible(e, reverse) && self.graph.way_of(e).attrs.roundabout == roundabout
            })
            .map(|&e| {
                let edge = &self.graph.edges[e as usize];
                let other = if edge.from == node { edge.to } else { edge.from };
                bearing(here, self.graph.coord(other))
            })
            .collect()
    }

    fn finish(&self, p: PendingStep, end: usize) -> Step {
        let opts = self.opts;
        let instruction = instruction_text(
            opts.language,
            opts.format,
            p.step_type,
            p.name.as_deref(),
            p.exit_number,
            p.bearing_after,
        );
        Step {
            distance: opts.units.distance(p.distance),
            duration: round_to(p.duration, 1),
            step_type: p.step_type,
            instruction,
            name: p.name.unwrap_or_else(|| "-".to_string()),
            way_points: [p.start, end],
            exit_number: p.exit_number,
            exit_bearings: (opts.roundabout_exits && p.step_type == ENTER_ROUNDABOUT)
                .then_some(p.exit_bearings),
            maneuver: opts.maneuvers.then(|| Maneuver {
                location: self.track.points[p.start],
                bearing_before: p.bearing_before.round() as u32 % 360,
                bearing_after: p.bearing_after.round() as u32 % 360,
            }),
        }
    }

    fn build(&self, from: usize, to: usize) -> Vec<Step> {
        let mut steps = Vec::new();
        if from == to {
            let depart = PendingStep::new(DEPART, from, None, 0.0, 0.0);
            steps.push(self.finish(depart, to));
            steps.push(self.finish(PendingStep::new(GOAL, to, None, 0.0, 0.0), to));
            return steps;
        }

        let mut current = PendingStep::new(DEPART, from, self.name(from), 0.0, self.span_bearing(from));
        for i in from..to {
            if i > from {
                if let Some(next) = self.decide(i, &mut current) {
                    let done = std::mem::replace(&mut current, next);
                    steps.push(self.finish(done, i));
                }
            }
            current.distance += self.track.spans[i].distance;
            current.duration += self.track.spans[i].duration;
        }
        if current.step_type == ENTER_ROUNDABOUT && current.exit_number.is_none() {
            current.exit_number = Some(1);
        }
        let last_name = current.name.clone();
        let before = self.span_bearing(to - 1);
        steps.push(self.finish(current, to));
        steps.push(self.finish(PendingStep::new(GOAL, to, last_name, before, 0.0), to));
        steps
    }

    /// Step starting at vertex `i`, if the road changes there.
    fn decide(&self, i: usize, current: &mut PendingStep) -> Option<PendingStep> {
        let before = self.span_bearing(i - 1);
        let after = self.span_bearing(i);
        let (rb_in, rb_out) = (self.roundabout(i - 1), self.roundabout(i));
        let node = self.node_after(i - 1);
        let used: Vec<u32> = [self.track.spans[i - 1].edge, self.track.spans[i].edge]
            .into_iter()
            .flatten()
            .collect();

        match (rb_in, rb_out) {
            (false, true) => Some(PendingStep::new(ENTER_ROUNDABOUT, i, None, before, after)),
            (true, true) => {
                if let Some(node) = node {
                    let exits = self.other_exits(node, &used, false);
                    if !exits.is_empty() {
                        current.exit_number = Some(current.exit_number.unwrap_or(0) + 1);
                        current.exit_bearings.extend(exits.iter().map(|b| b.round() as u32 % 360));
                    }
                }
                None
            }
            (true, false) => {
                current.exit_number = Some(current.exit_number.unwrap_or(0) + 1);
                current.exit_bearings.push(after.round() as u32 % 360);
                let name = self.name(i);
                current.name = name.clone();
                Some(PendingStep::new(EXIT_ROUNDABOUT, i, name, before, after))
            }
            (false, false) => {
                let name = self.name(i);
                let angle = turn_angle(before, after);
                let mut kind = classify(angle);
                let alternatives = node.map(|n| self.other_exits(n, &used, false)).unwrap_or_default();
                if kind == CONTINUE {
                    // Fork: another road leaves close to our heading
                    let fork = alternatives
                        .iter()
                        .map(|b| turn_angle(before, *b))
                        .find(|a| a.abs() < 45.0);
                    if let Some(other) = fork {
                        kind = if angle < other { KEEP_LEFT } else { KEEP_RIGHT };
                    }
                }
                let renamed = name != current.name;
                let real_turn = kind != CONTINUE && !alternatives.is_empty();
                if renamed || (real_turn && kind != KEEP_LEFT && kind != KEEP_RIGHT) || kind == U_TURN {
                    Some(PendingStep::new(kind, i, name, before, after))
                } else {
                    None
                }
            }
        }
    }
}

/// Steps for the vertices `from..=to` of `track`.
pub(crate) fn build_steps(
    graph: &RouteGraph,
    w: &Weighting,
    track: &Track,
    opts: &InstructionOptions,
    from: usize,
    to: usize,
) -> Vec<Step> {
    StepBuilder {
        graph,
        w,
        track,
        opts,
    }
    .build(from, to)
}

fn cardinal(language: Language, bearing: f64) -> &'static str {
    const EN: [&str; 8] = ["north", "northeast", "east", "southeast", "south", "southwest", "west", "northwest"];
    const DE: [&str; 8] = ["Norden", "Nordosten", "Osten", "Südosten", "Süden", "Südwesten", "Westen", "Nordwesten"];
    let idx = (((bearing.rem_euclid(360.0) + 22.5) / 45.0) as usize) % 8;
    match language {
        Language::En => EN[idx],
        Language::De => DE[idx],
    }
}

fn ordinal_en(n: u32) -> String {
    let suffix = match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{n}{suffix}")
}

pub fn instruction_text(
    language: Language,
    format: InstructionsFormat,
    step_type: u8,
    name: Option<&str>,
    exit_number: Option<u32>,
    heading: f64,
) -> String {
    let name = name.map(|n| match format {
        InstructionsFormat::Text => n.to_string(),
        InstructionsFormat::Html => format!("<b>{n}</b>"),
    });
    let exit = exit_number.unwrap_or(1);
    match language {
        Language::En => {
            let onto = |base: &str| match &name {
                Some(n) => format!("{base} onto {n}"),
                None => base.to_string(),
            };
            match step_type {
                DEPART => match &name {
                    Some(n) => format!("Head {} on {n}", cardinal(language, heading)),
                    None => format!("Head {}", cardinal(language, heading)),
                },
                GOAL => match &name {
                    Some(n) => format!("Arrive at {n}"),
                    None => "Arrive at your destination".to_string(),
                },
                ENTER_ROUNDABOUT => onto(&format!("Enter the roundabout and take the {} exit", ordinal_en(exit))),
                EXIT_ROUNDABOUT => onto("Exit the roundabout"),
                TURN_LEFT => onto("Turn left"),
                TURN_RIGHT => onto("Turn right"),
                TURN_SHARP_LEFT => onto("Turn sharp left"),
                TURN_SHARP_RIGHT => onto("Turn sharp right"),
                TURN_SLIGHT_LEFT => onto("Turn slight left"),
                TURN_SLIGHT_RIGHT => onto("Turn slight right"),
                KEEP_LEFT => onto("Keep left"),
                KEEP_RIGHT => onto("Keep right"),
                U_TURN => onto("Make a U-turn"),
                _ => onto("Continue straight"),
            }
        }
        Language::De => {
            let onto = |base: &str| match &name {
                Some(n) => format!("{base} auf {n}"),
                None => base.to_string(),
            };
            match step_type {
                DEPART => match &name {
                    Some(n) => format!("Richtung {} auf {n}", cardinal(language, heading)),
                    None => format!("Richtung {}", cardinal(language, heading)),
                },
                GOAL => match &name {
                    Some(n) => format!("Ankunft an {n}"),
                    None => "Sie haben Ihr Ziel erreicht".to_string(),
                },
                ENTER_ROUNDABOUT => onto(&format!("Im Kreisverkehr die {exit}. Ausfahrt nehmen")),
                EXIT_ROUNDABOUT => onto("Kreisverkehr verlassen"),
                TURN_LEFT => onto("Links abbiegen"),
                TURN_RIGHT => onto("Rechts abbiegen"),
                TURN_SHARP_LEFT => onto("Scharf links abbiegen"),
                TURN_SHARP_RIGHT => onto("Scharf rechts abbiegen"),
                TURN_SLIGHT_LEFT => onto("Leicht links abbiegen"),
                TURN_SLIGHT_RIGHT => onto("Leicht rechts abbiegen"),
                KEEP_LEFT => onto("Links halten"),
                KEEP_RIGHT => onto("Rechts halten"),
                U_TURN => onto("Wenden"),
                _ => onto("Geradeaus weiterfahren"),
            }
        }
    }
}
