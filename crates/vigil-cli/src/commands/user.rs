use chrono::{DateTime, Utc};
use clap::Subcommand;
use uuid::Uuid;
use vigil_core::{Store, Subscription, SubscriptionStatus, SubscriptionTier, User};

#[derive(Subcommand)]
pub enum UserAction {
    /// Register (or update) an account
    Register {
        /// Full name
        name: String,
        /// Stable user id; generated when omitted
        #[arg(long)]
        id: Option<String>,
        /// Email address
        #[arg(long)]
        email: Option<String>,
        /// Phone number in E.164 form
        #[arg(long)]
        phone: Option<String>,
        /// Fixed UTC offset in minutes (e.g. 240 for Dubai)
        #[arg(long, default_value = "0")]
        utc_offset_minutes: i32,
    },
    /// Show an account
    Show {
        /// User ID
        id: String,
    },
    /// Record a subscription purchased on a store platform
    SetSubscription {
        /// User ID
        user: String,
        /// free, one_way, two_way, or pro_family
        tier: String,
        /// ios, android, ...
        #[arg(long, default_value = "ios")]
        platform: String,
        /// Store product identifier
        #[arg(long, default_value = "vigil.manual")]
        product_id: String,
        /// active, trialing, past_due, canceled, or expired
        #[arg(long, default_value = "active")]
        status: String,
        /// End of the current billing period (RFC3339)
        #[arg(long)]
        period_end: Option<DateTime<Utc>>,
    },
    /// List subscriptions for a user, newest first
    Subscriptions {
        /// User ID
        user: String,
    },
}

fn parse_tier(s: &str) -> SubscriptionTier {
    match s {
        "one_way" => SubscriptionTier::OneWay,
        "two_way" => SubscriptionTier::TwoWay,
        "pro_family" => SubscriptionTier::ProFamily,
        _ => SubscriptionTier::Free,
    }
}

fn parse_status(s: &str) -> SubscriptionStatus {
    match s {
        "trialing" => SubscriptionStatus::Trialing,
        "past_due" => SubscriptionStatus::PastDue,
        "canceled" => SubscriptionStatus::Canceled,
        "expired" => SubscriptionStatus::Expired,
        _ => SubscriptionStatus::Active,
    }
}

pub fn run(action: UserAction) -> Result<(), Box<dyn std::error::Error>> {
    let store = Store::open()?;

    match action {
        UserAction::Register {
            name,
            id,
            email,
            phone,
            utc_offset_minutes,
        } => {
            let now = Utc::now();
            let user = User {
                id: id.unwrap_or_else(|| Uuid::new_v4().to_string()),
                email,
                phone_e164: phone,
                full_name: name,
                utc_offset_minutes,
                created_at: now,
                updated_at: now,
            };
            store.upsert_user(&user)?;
            println!("User registered: {}", user.id);
            println!("{}", serde_json::to_string_pretty(&user)?);
        }
        UserAction::Show { id } => match store.get_user(&id)? {
            Some(user) => println!("{}", serde_json::to_string_pretty(&user)?),
            None => println!("User not found: {id}"),
        },
        UserAction::SetSubscription {
            user,
            tier,
            platform,
            product_id,
            status,
            period_end,
        } => {
            let now = Utc::now();
            let subscription = Subscription {
                id: Uuid::new_v4().to_string(),
                user_id: user,
                platform,
                product_id,
                tier: parse_tier(&tier),
                status: parse_status(&status),
                current_period_start: Some(now),
                current_period_end: period_end,
                external_transaction_id: None,
                created_at: now,
                updated_at: now,
            };
            store.upsert_subscription(&subscription)?;
            println!("Subscription recorded: {}", subscription.id);
            println!("{}", serde_json::to_string_pretty(&subscription)?);
        }
        UserAction::Subscriptions { user } => {
            let subscriptions = store.list_subscriptions(&user)?;
            println!("{}", serde_json::to_string_pretty(&subscriptions)?);
        }
    }
    Ok(())
}
