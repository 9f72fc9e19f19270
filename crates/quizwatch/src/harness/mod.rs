//! Simulated host environment
//!
//! Seeded stand-ins for everything the observer consumes from outside:
//! inspectable components that resolve on a schedule, adapters (healthy,
//! faulty and panicking), a host that counts penalties, and a scripted
//! operator that answers displayed items.

pub mod simulator;

pub use simulator::*;

use crate::accessor::{DynValue, Inspectable, MemberInfo, Visibility};
use crate::component::{Component, ObserverChain, ResolutionObserver};
use crate::error::MonitorError;
use crate::host::{Host, Presenter};
use crate::monitor::{FactAdapter, MonitorContext};
use crate::quiz::{QuestionBank, QuestionTemplate, QuizItem, RenderHint};
use crate::runtime::ChoiceHandle;
use crate::types::{ComponentId, ComponentRef, Fact};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Wire colours, indexed by the codes stored on a [`SimComponent`]
pub const COLORS: [&str; 5] = ["red", "blue", "white", "black", "yellow"];

/// Component kinds the simulator knows how to build
pub mod kinds {
    pub const WIRES: &str = "wires";
    /// Layout differs from what its adapter expects
    pub const FAULTY: &str = "faulty";
    /// Adapter panics after resolution
    pub const VOLATILE: &str = "volatile";
    /// Adapter declares it has nothing to ask
    pub const BLANK: &str = "blank";
}

/// Question templates for the simulated kinds
#[must_use]
pub fn sim_bank() -> QuestionBank {
    QuestionBank::new()
        .with(QuestionTemplate::new(
            "wire_count",
            "How many wires did {0} have?",
            ["3", "4", "5", "6"],
        ))
        .with(
            QuestionTemplate::new("cut_color", "Which colour of wire was cut on {0}?", COLORS)
                .with_hint(RenderHint::Grid),
        )
        .with(QuestionTemplate::new(
            "cut_position",
            "Which wire position was cut on {0}?",
            ["1st", "2nd", "3rd", "4th", "5th", "6th"],
        ))
}

#[derive(Debug, Clone)]
struct WireState {
    colors: Vec<u8>,
    cut: usize,
}

/// Inspectable component with a random wire layout
pub struct SimComponent {
    id: ComponentId,
    kind: String,
    resolve_at: u64,
    state: RwLock<WireState>,
    resolved: AtomicBool,
    observers: ObserverChain,
}

impl SimComponent {
    pub fn generate(id: ComponentId, kind: &str, resolve_at: u64, rng: &mut StdRng) -> Arc<Self> {
        let count = rng.gen_range(3..=6);
        let colors: Vec<u8> = (0..count).map(|_| rng.gen_range(0..COLORS.len() as u8)).collect();
        let cut = rng.gen_range(0..count);
        Arc::new(Self {
            id,
            kind: kind.to_string(),
            resolve_at,
            state: RwLock::new(WireState { colors, cut }),
            resolved: AtomicBool::new(false),
            observers: ObserverChain::new(),
        })
    }

    /// Tick at which the simulator resolves this component
    #[must_use]
    pub fn resolve_at(&self) -> u64 {
        self.resolve_at
    }

    /// Mark resolved and notify observers; later calls do nothing
    pub fn resolve(&self) {
        if !self.resolved.swap(true, Ordering::SeqCst) {
            self.observers.notify(self.id);
        }
    }

    #[must_use]
    pub fn wire_count(&self) -> usize {
        self.state.read().colors.len()
    }
}

impl Inspectable for SimComponent {
    fn scope(&self) -> ComponentRef {
        ComponentRef::new(self.id, self.kind.clone())
    }

    fn members(&self) -> Vec<MemberInfo> {
        vec![
            MemberInfo::field::<Vec<u8>>("colors").non_public(),
            MemberInfo::field::<usize>("cut").non_public().writable(),
            MemberInfo::property::<bool>("solved"),
            MemberInfo::method::<String>("color_name", 1),
        ]
    }

    fn read(&self, member: &str) -> Option<DynValue> {
        let state = self.state.read();
        match member {
            "colors" => Some(Box::new(state.colors.clone())),
            "cut" => Some(Box::new(state.cut)),
            "solved" => Some(Box::new(self.resolved.load(Ordering::SeqCst))),
            _ => None,
        }
    }

    fn write(&self, member: &str, value: DynValue) -> Result<(), String> {
        match member {
            "cut" => {
                let cut = value.downcast::<usize>().map_err(|_| "cut expects usize".to_string())?;
                self.state.write().cut = *cut;
                Ok(())
            }
            other => Err(format!("`{other}` is read-only")),
        }
    }

    fn invoke(&self, member: &str, args: Vec<DynValue>) -> Result<DynValue, String> {
        if member != "color_name" {
            return Err(format!("no method `{member}`"));
        }
        let code = args
            .into_iter()
            .next()
            .and_then(|a| a.downcast::<u8>().ok())
            .ok_or_else(|| "color_name expects one u8".to_string())?;
        COLORS
            .get(usize::from(*code))
            .map(|name| Box::new((*name).to_string()) as DynValue)
            .ok_or_else(|| format!("unknown colour code {code}"))
    }
}

/// Shares one component between the `Component` and `Inspectable` views
struct Target(Arc<SimComponent>);

impl Inspectable for Target {
    fn scope(&self) -> ComponentRef {
        Inspectable::scope(self.0.as_ref())
    }
    fn members(&self) -> Vec<MemberInfo> {
        self.0.members()
    }
    fn read(&self, member: &str) -> Option<DynValue> {
        self.0.read(member)
    }
    fn write(&self, member: &str, value: DynValue) -> Result<(), String> {
        self.0.write(member, value)
    }
    fn invoke(&self, member: &str, args: Vec<DynValue>) -> Result<DynValue, String> {
        self.0.invoke(member, args)
    }
}

/// Component view over a shared [`SimComponent`]
pub struct SimHandle(pub Arc<SimComponent>);

impl Component for SimHandle {
    fn id(&self) -> ComponentId {
        self.0.id
    }

    fn kind(&self) -> &str {
        &self.0.kind
    }

    fn is_resolved(&self) -> bool {
        self.0.resolved.load(Ordering::SeqCst)
    }

    fn subscribe(&self, observer: ResolutionObserver) {
        self.0.observers.push(observer);
    }

    fn target(&self) -> Arc<dyn Inspectable> {
        Arc::new(Target(Arc::clone(&self.0)))
    }
}

/// Reads wire layouts through accessors
#[derive(Debug, Default)]
pub struct WiresAdapter;

#[async_trait]
impl FactAdapter for WiresAdapter {
    fn kind(&self) -> &str {
        kinds::WIRES
    }

    async fn extract(&self, cx: &mut MonitorContext) -> Result<(), MonitorError> {
        cx.wait_until_resolved().await;

        let colors = cx
            .array::<u8>("colors", Visibility::NonPublic)?
            .get_each_checked("colour code below 5", |c| usize::from(*c) < COLORS.len())?;
        let cut = cx.field::<usize>("cut", Visibility::NonPublic)?.get_in(0..colors.len())?;
        let cut_color: String = cx
            .method("color_name", Visibility::Public, Some(1))?
            .invoke_as(vec![Box::new(colors[cut]) as DynValue])?;

        let name = cx.scope().to_string();
        cx.emit(Fact::new("wire_count", colors.len().to_string()).arg(name.clone()));

        // Colours actually present on the module make the best distractors
        let present: Vec<&str> = colors
            .iter()
            .map(|c| COLORS[usize::from(*c)])
            .filter(|c| *c != cut_color)
            .collect();
        cx.emit(
            Fact::new("cut_color", cut_color)
                .arg(name.clone())
                .prefer_wrong(present),
        );

        let ordinal = ["1st", "2nd", "3rd", "4th", "5th", "6th"]
            .get(cut)
            .ok_or_else(|| cx.abandon(format!("cut index {cut} has no ordinal")))?;
        cx.emit(Fact::new("cut_position", *ordinal).arg(name));
        Ok(())
    }
}

/// Expects colour names where the component stores codes
#[derive(Debug, Default)]
pub struct FaultyAdapter;

#[async_trait]
impl FactAdapter for FaultyAdapter {
    fn kind(&self) -> &str {
        kinds::FAULTY
    }

    async fn extract(&self, cx: &mut MonitorContext) -> Result<(), MonitorError> {
        cx.wait_until_resolved().await;
        let colors = cx.array::<String>("colors", Visibility::NonPublic)?.get()?;
        cx.emit(Fact::new("wire_count", colors.len().to_string()).arg(cx.scope().to_string()));
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct PanickingAdapter;

#[async_trait]
impl FactAdapter for PanickingAdapter {
    fn kind(&self) -> &str {
        kinds::VOLATILE
    }

    async fn extract(&self, cx: &mut MonitorContext) -> Result<(), MonitorError> {
        cx.wait_until_resolved().await;
        panic!("volatile adapter lost track of {}", cx.scope());
    }
}

#[derive(Debug, Default)]
pub struct BlankAdapter;

#[async_trait]
impl FactAdapter for BlankAdapter {
    fn kind(&self) -> &str {
        kinds::BLANK
    }

    async fn extract(&self, cx: &mut MonitorContext) -> Result<(), MonitorError> {
        cx.wait_until_resolved().await;
        cx.declare_intentionally_empty();
        Ok(())
    }
}

/// Host that records penalties
#[derive(Debug, Default)]
pub struct SimHost {
    penalties: AtomicU64,
    penalized: Mutex<Vec<ComponentRef>>,
    finished: AtomicU64,
}

impl SimHost {
    #[must_use]
    pub fn penalties(&self) -> u64 {
        self.penalties.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn penalized(&self) -> Vec<ComponentRef> {
        self.penalized.lock().clone()
    }

    /// Times `declare_finished` was called
    #[must_use]
    pub fn finished_count(&self) -> u64 {
        self.finished.load(Ordering::SeqCst)
    }
}

impl Host for SimHost {
    fn apply_penalty(&self, component: &ComponentRef) {
        self.penalties.fetch_add(1, Ordering::SeqCst);
        self.penalized.lock().push(component.clone());
    }

    fn declare_finished(&self) {
        self.finished.fetch_add(1, Ordering::SeqCst);
    }
}

/// Presenter that answers every displayed item after a delay
///
/// Answers correctly with probability `accuracy`.
pub struct ScriptedOperator {
    accuracy: f64,
    delay: Duration,
    rng: Mutex<StdRng>,
    choices: Mutex<Option<ChoiceHandle>>,
    displayed: Mutex<Vec<QuizItem>>,
    reveals: AtomicU64,
}

impl ScriptedOperator {
    #[must_use]
    pub fn new(accuracy: f64, delay: Duration, seed: u64) -> Self {
        Self {
            accuracy: accuracy.clamp(0.0, 1.0),
            delay,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            choices: Mutex::new(None),
            displayed: Mutex::new(Vec::new()),
            reveals: AtomicU64::new(0),
        }
    }

    /// Connect the operator to a running observer
    pub fn attach(&self, handle: ChoiceHandle) {
        *self.choices.lock() = Some(handle);
    }

    #[must_use]
    pub fn displayed(&self) -> Vec<QuizItem> {
        self.displayed.lock().clone()
    }

    /// Reveal toggles seen so far
    #[must_use]
    pub fn reveals(&self) -> u64 {
        self.reveals.load(Ordering::SeqCst)
    }
}

impl Presenter for ScriptedOperator {
    fn display_item(&self, item: &QuizItem) {
        self.displayed.lock().push(item.clone());
        let Some(handle) = self.choices.lock().clone() else {
            tracing::warn!(tag = %item.tag, "operator not attached; item left unanswered");
            return;
        };

        let choice = {
            let mut rng = self.rng.lock();
            if rng.gen_bool(self.accuracy) {
                item.correct_index
            } else {
                let wrong = rng.gen_range(0..item.answers.len() - 1);
                if wrong >= item.correct_index {
                    wrong + 1
                } else {
                    wrong
                }
            }
        };
        let delay = self.delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            handle.choose(choice);
        });
    }

    fn acknowledge_correct(&self, item: &QuizItem) {
        tracing::trace!(tag = %item.tag, "operator answered correctly");
    }

    fn reveal_correct(&self, _item: &QuizItem, _blink_on: bool) {
        self.reveals.fetch_add(1, Ordering::SeqCst);
    }

    fn clear(&self) {}
}

impl std::fmt::Debug for ScriptedOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedOperator")
            .field("accuracy", &self.accuracy)
            .field("delay", &self.delay)
            .field("displayed", &self.displayed.lock().len())
            .finish_non_exhaustive()
    }
}
