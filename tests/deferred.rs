use ferrous_wire::{
    ApplicationReady, Component, ComponentRegistry, ComponentTarget, DeferredOutcome, DeferredTrigger, DiError,
    DiObserver, Injected, InjectionPoint, Lookup, RegistrationOptions, Scope, SlotState,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct Recorder {
    completed: Mutex<Vec<DeferredOutcome>>,
    failures: Mutex<Vec<DiError>>,
}

impl DiObserver for Recorder {
    fn deferred_completed(&self, outcome: &DeferredOutcome) {
        self.completed.lock().push(outcome.clone());
    }

    fn deferred_failed(&self, error: &DiError) {
        self.failures.lock().push(error.clone());
    }
}

#[derive(Default)]
struct NotificationService {
    mailer: Injected<MailerService>,
}
impl Component for NotificationService {
    fn injection_point(&self, property: &str) -> Option<&dyn InjectionPoint> {
        match property {
            "mailerService" => Some(&self.mailer),
            _ => None,
        }
    }
}

#[derive(Default)]
struct MailerService {
    notifications: Injected<NotificationService>,
}
impl Component for MailerService {
    fn injection_point(&self, property: &str) -> Option<&dyn InjectionPoint> {
        match property {
            "notificationService" => Some(&self.notifications),
            _ => None,
        }
    }
}

fn notifications() -> ComponentTarget {
    ComponentTarget::new(|_| NotificationService::default()).with_dependency("mailerService", "MailerService")
}

fn mailer() -> ComponentTarget {
    ComponentTarget::new(|_| MailerService::default()).with_dependency("notificationService", "NotificationService")
}

async fn settle<F: Fn() -> bool>(done: F) {
    for _ in 0..80 {
        if done() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}

#[tokio::test]
async fn timeout_wires_cycle_without_readiness_signal() {
    let recorder = Arc::new(Recorder::default());
    let registry = ComponentRegistry::builder()
        .deferred_timeout(Duration::from_millis(50))
        .add_observer(recorder.clone())
        .build();

    registry.register("NotificationService", notifications(), RegistrationOptions::new()).unwrap();
    registry.register("MailerService", mailer(), RegistrationOptions::new()).unwrap();

    let service = registry.get_required::<NotificationService>("NotificationService");
    assert_eq!(service.mailer.state(), SlotState::Pending);

    settle(|| recorder.completed.lock().len() == 2).await;

    assert!(service.mailer.is_wired());
    let completed = recorder.completed.lock();
    assert_eq!(completed.len(), 2);
    assert!(completed.iter().all(|o| o.trigger == DeferredTrigger::Timeout && o.is_complete()));
}

#[tokio::test]
async fn timeout_leaves_missing_dependency_empty() {
    let recorder = Arc::new(Recorder::default());
    let registry = ComponentRegistry::builder()
        .deferred_timeout(Duration::from_millis(50))
        .add_observer(recorder.clone())
        .build();

    registry.register("NotificationService", notifications(), RegistrationOptions::new()).unwrap();
    let service = registry.get_required::<NotificationService>("NotificationService");

    settle(|| recorder.completed.lock().len() == 1).await;

    assert_eq!(service.mailer.state(), SlotState::Empty);
    assert!(service.mailer.get().is_none());
    let failures = recorder.failures.lock();
    assert!(matches!(
        &failures[0],
        DiError::DeferredResolutionFailure { component, property, dependency, .. }
            if component == "NotificationService" && property == "mailerService" && dependency == "MailerService"
    ));
    assert_eq!(recorder.completed.lock()[0].emptied, ["mailerService"]);
}

#[test]
fn batch_runs_once_when_signal_precedes_timeout() {
    let recorder = Arc::new(Recorder::default());
    let ready = Arc::new(ApplicationReady::new());
    let registry = ComponentRegistry::builder()
        .readiness(ready.clone())
        .deferred_timeout(Duration::from_millis(300))
        .add_observer(recorder.clone())
        .build();

    registry.register("NotificationService", notifications(), RegistrationOptions::new()).unwrap();
    registry.register("MailerService", mailer(), RegistrationOptions::new()).unwrap();

    assert_eq!(ready.fire(), 2);
    assert_eq!(ready.fire(), 0);
    std::thread::sleep(Duration::from_millis(500));

    let completed = recorder.completed.lock();
    assert_eq!(completed.len(), 2);
    assert!(completed.iter().all(|o| o.trigger == DeferredTrigger::Ready));
}

#[test]
fn signal_fired_before_registration_runs_batch_immediately() {
    let ready = Arc::new(ApplicationReady::new());
    ready.fire();
    let recorder = Arc::new(Recorder::default());
    let registry = ComponentRegistry::builder()
        .readiness(ready)
        .add_observer(recorder.clone())
        .build();

    registry.register("NotificationService", notifications(), RegistrationOptions::new()).unwrap();

    let service = registry.get_required::<NotificationService>("NotificationService");
    assert_eq!(service.mailer.state(), SlotState::Empty);
    assert_eq!(recorder.failures.lock().len(), 1);
}

#[test]
fn early_registration_completes_batch() {
    let recorder = Arc::new(Recorder::default());
    let registry = ComponentRegistry::builder()
        .readiness(Arc::new(ApplicationReady::new()))
        .add_observer(recorder.clone())
        .build();

    registry.register("NotificationService", notifications(), RegistrationOptions::new()).unwrap();
    registry
        .register(
            "MailerService",
            ComponentTarget::new(|_| MailerService::default()),
            RegistrationOptions::new(),
        )
        .unwrap();

    let completed = recorder.completed.lock();
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].trigger, DeferredTrigger::DependencyRegistered);
    assert_eq!(completed[0].wired, ["mailerService"]);
}

#[test]
fn always_deferred_property_waits_for_signal() {
    let ready = Arc::new(ApplicationReady::new());
    let registry = ComponentRegistry::builder().readiness(ready.clone()).build();

    registry
        .register("MailerService", ComponentTarget::new(|_| MailerService::default()), RegistrationOptions::new())
        .unwrap();
    registry
        .register(
            "NotificationService",
            ComponentTarget::new(|_| NotificationService::default())
                .with_deferred_dependency("mailerService", "MailerService"),
            RegistrationOptions::new(),
        )
        .unwrap();

    let service = registry.get_required::<NotificationService>("NotificationService");
    assert_eq!(service.mailer.state(), SlotState::Pending);
    ready.fire();
    assert!(service.mailer.is_wired());
}

struct Pool {
    size: u32,
}
impl Component for Pool {}

#[derive(Default)]
struct PoolClient {
    pool: Injected<Pool>,
}
impl Component for PoolClient {
    fn injection_point(&self, property: &str) -> Option<&dyn InjectionPoint> {
        (property == "pool").then_some(&self.pool as &dyn InjectionPoint)
    }
}

fn async_pool(constructed: Arc<AtomicUsize>) -> ComponentTarget {
    ComponentTarget::new(move |_| {
        constructed.fetch_add(1, Ordering::SeqCst);
        Pool { size: 8 }
    })
}

#[test]
fn async_component_is_constructed_on_signal() {
    let constructed = Arc::new(AtomicUsize::new(0));
    let ready = Arc::new(ApplicationReady::new());
    let registry = ComponentRegistry::builder().readiness(ready.clone()).build();

    registry
        .register("Pool", async_pool(constructed.clone()), RegistrationOptions::new().asynchronous())
        .unwrap();
    assert_eq!(constructed.load(Ordering::SeqCst), 0);
    assert!(matches!(registry.get("Pool").unwrap(), Lookup::NotYetAvailable));
    assert!(registry.get_typed::<Pool>("Pool").unwrap().is_none());
    assert_eq!(registry.pending_deferrals()[0].properties.len(), 0);

    ready.fire();
    assert_eq!(constructed.load(Ordering::SeqCst), 1);
    assert_eq!(registry.get_required::<Pool>("Pool").size, 8);
    assert!(registry.descriptor("Pool").unwrap().is_async());
}

#[test]
fn dependent_of_async_component_is_wired_after_construction() {
    for client_first in [false, true] {
        let constructed = Arc::new(AtomicUsize::new(0));
        let ready = Arc::new(ApplicationReady::new());
        let registry = ComponentRegistry::builder().readiness(ready.clone()).build();
        let client = || ComponentTarget::new(|_| PoolClient::default()).with_dependency("pool", "Pool");

        if client_first {
            registry.register("PoolClient", client(), RegistrationOptions::new()).unwrap();
        }
        registry
            .register("Pool", async_pool(constructed.clone()), RegistrationOptions::new().asynchronous())
            .unwrap();
        if !client_first {
            registry.register("PoolClient", client(), RegistrationOptions::new()).unwrap();
        }

        let client = registry.get_required::<PoolClient>("PoolClient");
        assert_eq!(client.pool.state(), SlotState::Pending);

        ready.fire();
        assert_eq!(client.pool.get().unwrap().size, 8);
        assert_eq!(constructed.load(Ordering::SeqCst), 1);
    }
}

#[test]
fn cleared_cyclic_singleton_is_not_yet_available() {
    let ready = Arc::new(ApplicationReady::new());
    let registry = ComponentRegistry::builder().readiness(ready.clone()).build();
    registry.register("NotificationService", notifications(), RegistrationOptions::new()).unwrap();
    registry.register("MailerService", mailer(), RegistrationOptions::new()).unwrap();
    ready.fire();

    let before = registry.get_required::<NotificationService>("NotificationService");
    registry.clear_instances();

    assert_eq!(before.mailer.state(), SlotState::Unset);
    assert!(matches!(registry.get("NotificationService").unwrap(), Lookup::NotYetAvailable));
    assert!(registry.pending_deferrals().is_empty());
}

fn wait_until<F: Fn() -> bool>(done: F) {
    for _ in 0..80 {
        if done() {
            return;
        }
        std::thread::sleep(Duration::from_millis(25));
    }
}

#[test]
fn signal_cancels_pending_timeouts() {
    let ready = Arc::new(ApplicationReady::new());
    let registry = ComponentRegistry::builder()
        .readiness(ready.clone())
        .deferred_timeout(Duration::from_secs(30))
        .build();

    registry.register("NotificationService", notifications(), RegistrationOptions::new()).unwrap();
    registry.register("MailerService", mailer(), RegistrationOptions::new()).unwrap();
    assert_eq!(registry.armed_timeouts(), 2);
    assert!(registry.pending_deferrals().iter().all(|p| p.timeout_armed));

    ready.fire();
    wait_until(|| registry.armed_timeouts() == 0);

    assert_eq!(registry.armed_timeouts(), 0);
    assert!(registry.pending_deferrals().is_empty());
}

#[tokio::test]
async fn signal_cancels_runtime_timeouts() {
    let ready = Arc::new(ApplicationReady::new());
    let registry = ComponentRegistry::builder()
        .readiness(ready.clone())
        .deferred_timeout(Duration::from_secs(30))
        .build();

    registry.register("NotificationService", notifications(), RegistrationOptions::new()).unwrap();
    registry.register("MailerService", mailer(), RegistrationOptions::new()).unwrap();
    assert_eq!(registry.armed_timeouts(), 2);

    ready.fire();
    settle(|| registry.armed_timeouts() == 0).await;

    assert_eq!(registry.armed_timeouts(), 0);
    let service = registry.get_required::<NotificationService>("NotificationService");
    assert!(service.mailer.is_wired());
}

#[derive(Default)]
struct Relay {
    sink: Injected<Sink>,
}
impl Component for Relay {
    fn injection_point(&self, property: &str) -> Option<&dyn InjectionPoint> {
        (property == "sink").then_some(&self.sink as &dyn InjectionPoint)
    }
}

#[derive(Default)]
struct Sink {
    relay: Injected<Relay>,
}
impl Component for Sink {
    fn injection_point(&self, property: &str) -> Option<&dyn InjectionPoint> {
        (property == "relay").then_some(&self.relay as &dyn InjectionPoint)
    }
}

#[test]
fn prototype_lookups_after_signal_arm_no_timeouts() {
    let ready = Arc::new(ApplicationReady::new());
    ready.fire();
    let registry = ComponentRegistry::builder()
        .readiness(ready)
        .deferred_timeout(Duration::from_secs(30))
        .build();

    registry
        .register(
            "Sink",
            ComponentTarget::new(|_| Sink::default()).with_dependency("relay", "Relay"),
            RegistrationOptions::new(),
        )
        .unwrap();
    registry
        .register(
            "Relay",
            ComponentTarget::new(|_| Relay::default()).with_dependency("sink", "Sink"),
            RegistrationOptions::new().scope(Scope::Prototype),
        )
        .unwrap();

    for _ in 0..200 {
        let relay = registry.get_required::<Relay>("Relay");
        assert!(relay.sink.is_wired());
    }
    assert_eq!(registry.armed_timeouts(), 0);
    assert!(registry.pending_deferrals().is_empty());
}
