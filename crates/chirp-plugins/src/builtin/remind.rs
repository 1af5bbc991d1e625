use std::time::Duration;

use async_trait::async_trait;

use chirp_store::SharedStore;

use crate::error::Result;
use crate::plugin::{MatchContext, Plugin, Reply, Trigger};

const MAX_DELAY_SECS: u64 = 24 * 60 * 60;

/// `remind me in 10m stand up`: acknowledges now, answers later.
pub struct RemindPlugin {
    trigger: Trigger,
}

impl RemindPlugin {
    pub fn new() -> Result<Self> {
        Ok(Self {
            trigger: Trigger::new(
                "remind",
                r"(?i)\bremind me in (\d+)\s*([smh])[a-z]*\s+(.+)",
                false,
            )?,
        })
    }
}

fn delay_secs(amount: &str, unit: &str) -> Option<u64> {
    let amount: u64 = amount.parse().ok()?;
    let scale = match unit.to_ascii_lowercase().as_str() {
        "s" => 1,
        "m" => 60,
        "h" => 3600,
        _ => return None,
    };
    amount.checked_mul(scale)
}

#[async_trait]
impl Plugin for RemindPlugin {
    fn name(&self) -> &str {
        "remind"
    }

    fn description(&self) -> &str {
        "send a reminder after a delay"
    }

    fn pattern(&self) -> &str {
        "remind me in <n>[s|m|h] <text>"
    }

    fn matches(&self, ctx: &MatchContext<'_>, body: &str) -> bool {
        self.trigger.is_match(ctx, body)
    }

    fn set_store(&self, _store: SharedStore) {}

    async fn process(&self, from: &str, body: &str) -> Reply {
        let Some(caps) = self.trigger.regex().captures(body) else {
            return Reply::none();
        };

        let secs = match delay_secs(&caps[1], &caps[2]) {
            Some(secs) if secs <= MAX_DELAY_SECS => secs,
            _ => return Reply::text("sorry, I can only remind you up to 24h ahead"),
        };

        let what = caps[3].trim().to_string();
        let who = from.to_string();
        Reply::text(format!("ok {from}, I'll remind you in {}{}", &caps[1], &caps[2]))
            .with_deferred(async move {
                tokio::time::sleep(Duration::from_secs(secs)).await;
                format!("{who}: {what}")
            })
    }
}
