//! Per-node transition descriptors for an external animated-group renderer.
//!
//! The renderer keys nodes by id and asks for one descriptor per lifecycle
//! phase: `start` (concrete initial state), then `enter`, `update` and
//! `leave` transitions. This module only produces the targets; the renderer
//! owns the clock and the interpolation.
//!
//! Timing and events for an animatable key resolve in this order:
//! 1. whatever the key's phase method returns,
//! 2. the key's own `timing` / `events`,
//! 3. the config's root `timing` / `events`,
//! 4. nothing.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use crate::model::AttrValue;

/// Output of a datum processor: attribute name to value.
pub type ProcessedDatum = BTreeMap<String, AttrValue>;

/// Turns a raw datum into its processed attribute map.
pub type DatumProcessor<D> = Arc<dyn Fn(&D) -> ProcessedDatum + Send + Sync>;

/// User override for one key: `(processed value, processed datum, index)`.
pub type PhaseMethod = Arc<dyn Fn(&AttrValue, &ProcessedDatum, usize) -> Override + Send + Sync>;

/// Lifecycle callback; receives the attribute key it was registered for.
pub type Hook = Arc<dyn Fn(&str) + Send + Sync>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Start,
    Enter,
    Update,
    Leave,
}

impl Phase {
    pub const ALL: [Phase; 4] = [Phase::Start, Phase::Enter, Phase::Update, Phase::Leave];
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Start => "start",
            Phase::Enter => "enter",
            Phase::Update => "update",
            Phase::Leave => "leave",
        })
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Easing {
    #[default]
    Linear,
    QuadIn,
    QuadOut,
    QuadInOut,
    CubicIn,
    CubicOut,
    CubicInOut,
}

impl Easing {
    /// Maps progress `t` in [0, 1] to eased progress in [0, 1].
    ///
    /// Descriptors only carry the easing name; renderers that interpolate
    /// in Rust call this to evaluate it.
    pub fn apply(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::QuadIn => t * t,
            Easing::QuadOut => 1.0 - (1.0 - t) * (1.0 - t),
            Easing::QuadInOut => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(2) / 2.0
                }
            }
            Easing::CubicIn => t * t * t,
            Easing::CubicOut => 1.0 - (1.0 - t).powi(3),
            Easing::CubicInOut => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
                }
            }
        }
    }
}

/// Transition timing in milliseconds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timing {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ease: Option<Easing>,
}

impl Timing {
    pub fn delay(ms: u64) -> Self {
        Self {
            delay: Some(ms),
            ..Self::default()
        }
    }

    pub fn duration(ms: u64) -> Self {
        Self {
            duration: Some(ms),
            ..Self::default()
        }
    }

    pub fn with_ease(mut self, ease: Easing) -> Self {
        self.ease = Some(ease);
        self
    }
}

/// Lifecycle hooks fired by the renderer.
#[derive(Clone, Default)]
pub struct Events {
    pub start: Option<Hook>,
    pub interrupt: Option<Hook>,
    pub end: Option<Hook>,
}

impl fmt::Debug for Events {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Events")
            .field("start", &self.start.is_some())
            .field("interrupt", &self.interrupt.is_some())
            .field("end", &self.end.is_some())
            .finish()
    }
}

/// Hooks compare by identity.
impl PartialEq for Events {
    fn eq(&self, other: &Self) -> bool {
        fn same(a: &Option<Hook>, b: &Option<Hook>) -> bool {
            match (a, b) {
                (Some(a), Some(b)) => Arc::ptr_eq(a, b),
                (None, None) => true,
                _ => false,
            }
        }
        same(&self.start, &other.start)
            && same(&self.interrupt, &other.interrupt)
            && same(&self.end, &other.end)
    }
}

/// Target for one attribute in a transition.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Target {
    /// Snap to the value.
    Set(AttrValue),
    /// Interpolate through the listed values, ending at the last.
    Interpolate(Vec<AttrValue>),
}

impl Target {
    pub fn to(v: impl Into<AttrValue>) -> Self {
        Target::Interpolate(vec![v.into()])
    }

    /// The value the attribute ends at.
    pub fn end(&self) -> Option<&AttrValue> {
        match self {
            Target::Set(v) => Some(v),
            Target::Interpolate(vs) => vs.last(),
        }
    }
}

/// What a phase method returns; merged over the defaults for its key.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Override {
    pub values: BTreeMap<String, Target>,
    pub timing: Option<Timing>,
    pub events: Option<Events>,
}

impl Override {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn to(mut self, key: impl Into<String>, v: impl Into<AttrValue>) -> Self {
        self.values.insert(key.into(), Target::to(v));
        self
    }

    pub fn set(mut self, key: impl Into<String>, v: impl Into<AttrValue>) -> Self {
        self.values.insert(key.into(), Target::Set(v.into()));
        self
    }

    pub fn timing(mut self, timing: Timing) -> Self {
        self.timing = Some(timing);
        self
    }

    pub fn events(mut self, events: Events) -> Self {
        self.events = Some(events);
        self
    }
}

/// Overrides for one attribute key.
#[derive(Clone, Default)]
pub struct KeyAnimation {
    pub start: Option<PhaseMethod>,
    pub enter: Option<PhaseMethod>,
    pub update: Option<PhaseMethod>,
    pub leave: Option<PhaseMethod>,
    /// Used for enter/update/leave when no phase-specific method is set.
    pub any: Option<PhaseMethod>,
    pub events: Option<Events>,
    pub timing: Option<Timing>,
}

impl fmt::Debug for KeyAnimation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyAnimation")
            .field("start", &self.start.is_some())
            .field("enter", &self.enter.is_some())
            .field("update", &self.update.is_some())
            .field("leave", &self.leave.is_some())
            .field("any", &self.any.is_some())
            .field("events", &self.events)
            .field("timing", &self.timing)
            .finish()
    }
}

impl KeyAnimation {
    pub fn on<F>(mut self, phase: Phase, method: F) -> Self
    where
        F: Fn(&AttrValue, &ProcessedDatum, usize) -> Override + Send + Sync + 'static,
    {
        let method: PhaseMethod = Arc::new(method);
        match phase {
            Phase::Start => self.start = Some(method),
            Phase::Enter => self.enter = Some(method),
            Phase::Update => self.update = Some(method),
            Phase::Leave => self.leave = Some(method),
        }
        self
    }

    pub fn on_any<F>(mut self, method: F) -> Self
    where
        F: Fn(&AttrValue, &ProcessedDatum, usize) -> Override + Send + Sync + 'static,
    {
        self.any = Some(Arc::new(method));
        self
    }

    pub fn timing(mut self, timing: Timing) -> Self {
        self.timing = Some(timing);
        self
    }

    pub fn events(mut self, events: Events) -> Self {
        self.events = Some(events);
        self
    }

    fn method(&self, phase: Phase) -> Option<&PhaseMethod> {
        match phase {
            Phase::Start => self.start.as_ref(),
            Phase::Enter => self.enter.as_ref().or(self.any.as_ref()),
            Phase::Update => self.update.as_ref().or(self.any.as_ref()),
            Phase::Leave => self.leave.as_ref().or(self.any.as_ref()),
        }
    }
}

/// Per-key overrides plus root-level defaults.
#[derive(Clone, Debug, Default)]
pub struct KeyedAnimation {
    pub events: Option<Events>,
    pub timing: Option<Timing>,
    pub keys: BTreeMap<String, KeyAnimation>,
}

impl KeyedAnimation {
    pub fn key(mut self, key: impl Into<String>, animation: KeyAnimation) -> Self {
        self.keys.insert(key.into(), animation);
        self
    }

    pub fn timing(mut self, timing: Timing) -> Self {
        self.timing = Some(timing);
        self
    }

    pub fn events(mut self, events: Events) -> Self {
        self.events = Some(events);
        self
    }
}

#[derive(Clone, Debug)]
pub enum AnimationConfig {
    /// Render processed data directly; no processor is built.
    Disabled,
    /// Every animatable key tweens to its target with the same timing.
    DefaultForAll(Timing),
    PerKey(KeyedAnimation),
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self::opacity_fade()
    }
}

impl AnimationConfig {
    /// Cells fade in after a short delay and fade out on leave.
    pub fn opacity_fade() -> Self {
        let fade_in = |_: &AttrValue, _: &ProcessedDatum, _: usize| {
            Override::new().to("opacity", 1.0).timing(Timing::delay(333))
        };
        let fade_out = |_: &AttrValue, _: &ProcessedDatum, _: usize| {
            Override::new().to("opacity", 0.0).timing(Timing::duration(666))
        };
        AnimationConfig::PerKey(KeyedAnimation::default().key(
            "opacity",
            KeyAnimation::default()
                .on(Phase::Enter, fade_in)
                .on(Phase::Update, fade_in)
                .on(Phase::Leave, fade_out),
        ))
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self, AnimationConfig::Disabled)
    }
}

/// Transition for one key (or one passthrough value).
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct KeyTransition {
    #[serde(flatten)]
    pub values: BTreeMap<String, Target>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timing: Option<Timing>,
    #[serde(skip)]
    pub events: Option<Events>,
}

impl KeyTransition {
    fn merge(&mut self, ov: Override) {
        self.values.extend(ov.values);
        if ov.timing.is_some() {
            self.timing = ov.timing;
        }
        if ov.events.is_some() {
            self.events = ov.events;
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TransitionDescriptor {
    /// Concrete initial state for the `start` phase.
    State(ProcessedDatum),
    /// One entry per processed key, in key order.
    Transition(Vec<KeyTransition>),
}

impl TransitionDescriptor {
    /// The entry carrying `key`, if this is a transition.
    pub fn entry(&self, key: &str) -> Option<&KeyTransition> {
        match self {
            TransitionDescriptor::State(_) => None,
            TransitionDescriptor::Transition(entries) => {
                entries.iter().find(|e| e.values.contains_key(key))
            }
        }
    }

    /// The value `key` ends at in this phase.
    pub fn value(&self, key: &str) -> Option<&AttrValue> {
        match self {
            TransitionDescriptor::State(state) => state.get(key),
            TransitionDescriptor::Transition(_) => self.entry(key)?.values.get(key)?.end(),
        }
    }
}

enum Mode {
    All(Timing),
    Keyed(KeyedAnimation),
}

/// Builds transition descriptors from processed data.
pub struct AnimationProcessor<D> {
    mode: Mode,
    animatable: BTreeSet<String>,
    processor: DatumProcessor<D>,
}

impl<D> fmt::Debug for AnimationProcessor<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnimationProcessor")
            .field("animatable", &self.animatable)
            .finish_non_exhaustive()
    }
}

/// Returns `None` for [`AnimationConfig::Disabled`]; callers then render the
/// datum processor's output directly.
pub fn process<D>(
    config: &AnimationConfig,
    animatable: &[&str],
    processor: DatumProcessor<D>,
) -> Option<AnimationProcessor<D>> {
    let mode = match config {
        AnimationConfig::Disabled => return None,
        AnimationConfig::DefaultForAll(timing) => Mode::All(*timing),
        AnimationConfig::PerKey(keyed) => Mode::Keyed(keyed.clone()),
    };
    Some(AnimationProcessor {
        mode,
        animatable: animatable.iter().map(|k| k.to_string()).collect(),
        processor,
    })
}

impl<D> AnimationProcessor<D> {
    pub fn is_animatable(&self, key: &str) -> bool {
        self.animatable.contains(key)
    }

    /// Descriptor factory for one phase.
    pub fn phase(&self, phase: Phase) -> impl Fn(&D, usize) -> TransitionDescriptor + '_ {
        move |datum, index| self.describe(phase, datum, index)
    }

    pub fn describe(&self, phase: Phase, datum: &D, index: usize) -> TransitionDescriptor {
        let processed = (self.processor)(datum);
        match phase {
            Phase::Start => TransitionDescriptor::State(self.start(processed, index)),
            _ => TransitionDescriptor::Transition(self.transition(phase, &processed, index)),
        }
    }

    fn start(&self, processed: ProcessedDatum, index: usize) -> ProcessedDatum {
        let Mode::Keyed(keyed) = &self.mode else {
            return processed;
        };
        let mut state = ProcessedDatum::new();
        for (key, value) in &processed {
            state.insert(key.clone(), value.clone());
            let Some(method) = keyed.keys.get(key).and_then(|k| k.method(Phase::Start)) else {
                continue;
            };
            for (k, target) in method(value, &processed, index).values {
                if let Some(v) = target.end() {
                    state.insert(k, v.clone());
                }
            }
        }
        state
    }

    fn transition(&self, phase: Phase, processed: &ProcessedDatum, index: usize) -> Vec<KeyTransition> {
        processed
            .iter()
            .map(|(key, value)| {
                let mut entry = KeyTransition::default();
                if !self.animatable.contains(key) {
                    entry.values.insert(key.clone(), Target::Set(value.clone()));
                    return entry;
                }
                entry.values.insert(key.clone(), Target::to(value.clone()));
                match &self.mode {
                    Mode::All(timing) => entry.timing = Some(*timing),
                    Mode::Keyed(keyed) => {
                        let own = keyed.keys.get(key);
                        entry.timing = own.and_then(|k| k.timing).or(keyed.timing);
                        entry.events = own
                            .and_then(|k| k.events.clone())
                            .or_else(|| keyed.events.clone());
                        if let Some(method) = own.and_then(|k| k.method(phase)) {
                            entry.merge(method(value, processed, index));
                        }
                    }
                }
                entry
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Cell {
        x: f64,
        label: &'static str,
    }

    fn proc() -> DatumProcessor<Cell> {
        Arc::new(|c: &Cell| {
            let mut d = ProcessedDatum::new();
            d.insert("x0".into(), AttrValue::Number(c.x));
            d.insert("opacity".into(), AttrValue::Number(0.25));
            d.insert("label".into(), AttrValue::from(c.label));
            d
        })
    }

    const KEYS: [&str; 2] = ["x0", "opacity"];

    fn cell() -> Cell {
        Cell { x: 12.0, label: "Asia" }
    }

    #[test]
    fn disabled_builds_no_processor() {
        assert!(process(&AnimationConfig::Disabled, &KEYS, proc()).is_none());
    }

    #[test]
    fn phase_override_replaces_default() {
        let config = AnimationConfig::PerKey(KeyedAnimation::default().key(
            "opacity",
            KeyAnimation::default().on(Phase::Update, |_, _, _| {
                Override::new().to("opacity", 1.0).timing(Timing::duration(500))
            }),
        ));
        let p = process(&config, &["opacity"], proc()).unwrap();
        let d = p.phase(Phase::Update)(&cell(), 0);

        let opacity = d.entry("opacity").unwrap();
        assert_eq!(opacity.values["opacity"], Target::to(1.0));
        assert_eq!(opacity.timing, Some(Timing::duration(500)));
        // Keys outside the animatable list pass through untouched.
        assert_eq!(d.entry("x0").unwrap().values["x0"], Target::Set(AttrValue::Number(12.0)));
        assert_eq!(d.entry("label").unwrap().timing, None);
    }

    #[test]
    fn default_wraps_animatable_values() {
        let config = AnimationConfig::PerKey(KeyedAnimation::default());
        let p = process(&config, &KEYS, proc()).unwrap();
        let d = p.describe(Phase::Enter, &cell(), 3);
        assert_eq!(d.entry("x0").unwrap().values["x0"], Target::to(12.0));
        assert_eq!(d.entry("opacity").unwrap().values["opacity"], Target::to(0.25));
        assert_eq!(
            d.entry("label").unwrap().values["label"],
            Target::Set(AttrValue::from("Asia"))
        );
    }

    #[test]
    fn timing_resolution_order() {
        let config = AnimationConfig::PerKey(
            KeyedAnimation::default()
                .timing(Timing::duration(100))
                .key("x0", KeyAnimation::default().timing(Timing::duration(200)))
                .key(
                    "opacity",
                    KeyAnimation::default()
                        .timing(Timing::duration(300))
                        .on(Phase::Leave, |_, _, _| Override::new().timing(Timing::delay(50))),
                ),
        );
        let p = process(&config, &["x0", "opacity", "width"], proc()).unwrap();
        let width_proc: DatumProcessor<Cell> = Arc::new(|c: &Cell| {
            let mut d = (proc())(c);
            d.insert("width".into(), AttrValue::Number(4.0));
            d
        });
        let q = process(&config, &["x0", "opacity", "width"], width_proc).unwrap();

        let update = p.describe(Phase::Update, &cell(), 0);
        assert_eq!(update.entry("x0").unwrap().timing, Some(Timing::duration(200)));
        assert_eq!(update.entry("opacity").unwrap().timing, Some(Timing::duration(300)));

        let leave = p.describe(Phase::Leave, &cell(), 0);
        assert_eq!(leave.entry("opacity").unwrap().timing, Some(Timing::delay(50)));
        // Override without values keeps the default target.
        assert_eq!(leave.value("opacity"), Some(&AttrValue::Number(0.25)));

        let root_only = q.describe(Phase::Enter, &cell(), 0);
        assert_eq!(root_only.entry("width").unwrap().timing, Some(Timing::duration(100)));
    }

    #[test]
    fn events_fall_back_to_root() {
        let root_hook: Hook = Arc::new(|_: &str| {});
        let key_hook: Hook = Arc::new(|_: &str| {});
        let root_events = Events {
            end: Some(root_hook),
            ..Events::default()
        };
        let key_events = Events {
            start: Some(key_hook),
            ..Events::default()
        };
        let config = AnimationConfig::PerKey(
            KeyedAnimation::default()
                .events(root_events.clone())
                .key("x0", KeyAnimation::default().events(key_events.clone())),
        );
        let p = process(&config, &KEYS, proc()).unwrap();
        let d = p.describe(Phase::Update, &cell(), 0);
        assert_eq!(d.entry("x0").unwrap().events, Some(key_events));
        assert_eq!(d.entry("opacity").unwrap().events, Some(root_events));
    }

    #[test]
    fn phase_agnostic_method_applies_to_all_transitions() {
        let config = AnimationConfig::PerKey(KeyedAnimation::default().key(
            "x0",
            KeyAnimation::default()
                .on_any(|v, _, i| {
                    let x = v.as_f64().unwrap_or_default();
                    Override::new()
                        .to("x0", x * 2.0)
                        .timing(Timing::delay(i as u64 * 10))
                })
                .on(Phase::Leave, |_, _, _| Override::new().to("x0", 0.0)),
        ));
        let p = process(&config, &KEYS, proc()).unwrap();
        let enter = p.describe(Phase::Enter, &cell(), 2);
        assert_eq!(enter.value("x0"), Some(&AttrValue::Number(24.0)));
        assert_eq!(enter.entry("x0").unwrap().timing, Some(Timing::delay(20)));
        let leave = p.describe(Phase::Leave, &cell(), 2);
        assert_eq!(leave.value("x0"), Some(&AttrValue::Number(0.0)));
        assert_eq!(leave.entry("x0").unwrap().timing, None);
    }

    #[test]
    fn start_is_concrete_and_takes_start_override() {
        let config = AnimationConfig::PerKey(KeyedAnimation::default().key(
            "opacity",
            KeyAnimation::default()
                .on(Phase::Start, |_, _, _| Override::new().set("opacity", 0.0))
                .on_any(|_, _, _| Override::new().to("opacity", 1.0)),
        ));
        let p = process(&config, &KEYS, proc()).unwrap();
        let TransitionDescriptor::State(state) = p.describe(Phase::Start, &cell(), 0) else {
            panic!("start must be a concrete state");
        };
        assert_eq!(state["opacity"], AttrValue::Number(0.0));
        assert_eq!(state["x0"], AttrValue::Number(12.0));
        assert_eq!(state["label"], AttrValue::from("Asia"));
    }

    #[test]
    fn default_for_all_applies_one_timing() {
        let timing = Timing::duration(250).with_ease(Easing::CubicInOut);
        let p = process(&AnimationConfig::DefaultForAll(timing), &KEYS, proc()).unwrap();
        let d = p.describe(Phase::Update, &cell(), 0);
        assert_eq!(d.entry("x0").unwrap().timing, Some(timing));
        assert_eq!(d.entry("opacity").unwrap().timing, Some(timing));
        assert_eq!(d.entry("label").unwrap().timing, None);
        assert!(matches!(p.describe(Phase::Start, &cell(), 0), TransitionDescriptor::State(_)));
    }

    #[test]
    fn opacity_fade_preset() {
        let p = process(&AnimationConfig::default(), &KEYS, proc()).unwrap();
        let enter = p.describe(Phase::Enter, &cell(), 0);
        assert_eq!(enter.value("opacity"), Some(&AttrValue::Number(1.0)));
        assert_eq!(enter.entry("opacity").unwrap().timing, Some(Timing::delay(333)));
        let leave = p.describe(Phase::Leave, &cell(), 0);
        assert_eq!(leave.value("opacity"), Some(&AttrValue::Number(0.0)));
        assert_eq!(leave.entry("opacity").unwrap().timing, Some(Timing::duration(666)));
    }

    #[test]
    fn easing_endpoints() {
        for e in [
            Easing::Linear,
            Easing::QuadIn,
            Easing::QuadOut,
            Easing::QuadInOut,
            Easing::CubicIn,
            Easing::CubicOut,
            Easing::CubicInOut,
        ] {
            assert_eq!(e.apply(0.0), 0.0);
            assert!((e.apply(1.0) - 1.0).abs() < 1e-12);
            assert!((e.apply(0.5) - 0.5).abs() <= 0.375);
        }
    }
}
