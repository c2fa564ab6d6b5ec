//! # Vigil Core Library
//!
//! This library provides the core business logic for Vigil, a check-in
//! scheduling and escalation engine: recurring check-in prompts for a loved
//! one, a grace period for them to respond, and a multi-channel escalation
//! plan that alerts their people when they don't. All operations are
//! available via a standalone CLI binary; any GUI or service front-end is a
//! thin layer over the same core library.
//!
//! ## Architecture
//!
//! - **Evaluator**: Converts schedule local times (fixed UTC offsets) into
//!   due instants and opens pending checkins, idempotently per due slot
//! - **Lifecycle**: The checkin state machine (confirm, snooze, escalate,
//!   resolve, cancel) built on compare-and-swap storage transitions
//! - **Dispatcher**: Walks escalating checkins through their plan steps
//!   with per-step retries, recomputing position from persisted events
//! - **Engine**: The tick loop running evaluation, re-arm, expiry, and
//!   dispatch against a shared clock reading
//! - **Storage**: SQLite-based persistence and TOML-based configuration
//! - **Gateway**: Trait seam for provider webhooks (push, WhatsApp, SMS,
//!   voice, email)
//!
//! ## Key Components
//!
//! - [`Engine`]: The tick loop
//! - [`Store`]: Domain persistence
//! - [`Config`]: Application configuration management
//! - [`NotificationGateway`]: Trait for notification providers

pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod events;
pub mod gateway;
pub mod lifecycle;
pub mod model;
pub mod privacy;
pub mod storage;

pub use dispatcher::Dispatcher;
pub use engine::Engine;
pub use error::{ConfigError, CoreError, DatabaseError, GatewayError, ValidationError};
pub use evaluator::Evaluator;
pub use events::Event;
pub use gateway::{Delivery, NotificationGateway, NotificationPayload, WebhookGateway};
pub use lifecycle::Lifecycle;
pub use model::{
    Checkin, CheckinSchedule, CheckinStatus, ContactPoint, DeliveryStatus, DeviceToken,
    EscalationChannel, EscalationEvent, EscalationPlan, EscalationStep, LovedOneProfile,
    PairingCode, Relationship, ScheduleType, Subscription, SubscriptionStatus, SubscriptionTier,
    User,
};
pub use privacy::{erase_account, erase_domain_data, export_user_data, ExportBundle};
pub use storage::{Config, EngineConfig, EraseSummary, GatewayConfig, Store};
