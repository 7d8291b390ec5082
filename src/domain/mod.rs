//! Domain layer: entities shared by dispatch, webhooks and the API.

mod entities;

pub use entities::{
    DeliveryStatus, Entity, Integration, Message, MessageKind, MessageStatus, Plan, PlanTier,
    Timestamps, User, UserPlan,
};
