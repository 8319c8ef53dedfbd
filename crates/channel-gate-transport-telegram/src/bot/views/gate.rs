//! Gate UI components
//!
//! Renders core notices into HTML texts and inline keyboards.

use crate::platform::ChannelProbe;
use channel_gate_core::config::GateSettings;
use channel_gate_core::gateway::{AttemptKind, Diagnostics};
use channel_gate_core::link::CallbackAction;
use channel_gate_core::membership::MembershipStatus;
use channel_gate_core::platform::Notice;
use channel_gate_core::registry::{AssetId, MediaKind};
use html_escape::encode_text;
use reqwest::Url;
use std::fmt::Write;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};
use tracing::warn;

// ─────────────────────────────────────────────────────────────────────────────
// Button labels
// ─────────────────────────────────────────────────────────────────────────────

/// Label of the join button
pub const JOIN_BUTTON: &str = "📢 Join Channel";
/// Label of the recheck button
pub const RECHECK_BUTTON: &str = "✅ I Joined, Check Again";
/// Label of the forced recheck button
pub const FORCE_RECHECK_BUTTON: &str = "🔄 Force Refresh";
/// Label of the support button
pub const SUPPORT_BUTTON: &str = "🆘 Contact Support";

/// Notice ready to be sent: HTML text plus optional inline keyboard.
#[derive(Debug, Clone)]
pub struct RenderedNotice {
    /// HTML-formatted text
    pub text: String,
    /// Inline keyboard, if the notice offers actions
    pub keyboard: Option<InlineKeyboardMarkup>,
}

impl RenderedNotice {
    fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keyboard: None,
        }
    }
}

/// Chat and user details shown by `/debug`.
#[derive(Debug, Clone)]
pub struct DebugContext {
    /// Chat the command was sent in
    pub chat_id: i64,
    /// Chat type label
    pub chat_kind: &'static str,
    /// Chat title, if any
    pub chat_title: Option<String>,
    /// Requesting user
    pub user_id: i64,
    /// Requesting user's username
    pub username: Option<String>,
    /// Requesting user's first name
    pub first_name: String,
}

/// Renders gate notices for one deployment.
#[derive(Debug, Clone)]
pub struct GateView {
    channel_label: String,
    content_channel_id: i64,
    join_url: Option<Url>,
    support_url: Option<Url>,
}

impl GateView {
    /// Build from gate settings. Unparseable URLs are dropped with a warning.
    #[must_use]
    pub fn from_settings(settings: &GateSettings) -> Self {
        Self {
            channel_label: settings.gated_channel().label(),
            content_channel_id: settings.content_channel_id,
            join_url: parse_url("join", settings.join_url()),
            support_url: parse_url("support", settings.support_url.clone()),
        }
    }

    /// Render a core notice.
    #[must_use]
    pub fn render(&self, notice: &Notice) -> RenderedNotice {
        let channel = encode_text(&self.channel_label);
        match notice {
            Notice::Welcome => RenderedNotice::plain(format!(
                "👋 <b>Welcome to the media bot!</b>\n\n\
                 Send me a valid content link to access media files.\n\n\
                 Make sure you're a member of {channel} first!\n\n\
                 🔗 Links look like: <code>/start img1</code>"
            )),
            Notice::Challenge {
                asset_id,
                after: AttemptKind::Initial,
            } => RenderedNotice {
                text: format!(
                    "🚫 <b>Access Denied!</b>\n\n\
                     You need to join {channel} first to access this content.\n\n\
                     <b>Steps:</b>\n\
                     1️⃣ Click 'Join Channel'\n\
                     2️⃣ Join the channel\n\
                     3️⃣ Wait 10 seconds\n\
                     4️⃣ Click 'I Joined, Check Again'\n\n\
                     ⚠️ If still not working, try 'Force Refresh'"
                ),
                keyboard: Some(self.challenge_keyboard(*asset_id)),
            },
            Notice::Challenge { asset_id, .. } => RenderedNotice {
                text: format!(
                    "❌ <b>Still Not Detected as Member</b>\n\n\
                     This can happen due to Telegram's caching. Please:\n\n\
                     1️⃣ Make sure you actually joined {channel}\n\
                     2️⃣ Wait 30 seconds after joining\n\
                     3️⃣ Try 'Force Refresh' button\n\
                     4️⃣ If still failing, leave and rejoin the channel\n\n\
                     ⚠️ <b>Note:</b> Telegram sometimes takes time to update membership status."
                ),
                keyboard: Some(self.challenge_keyboard(*asset_id)),
            },
            Notice::Checking {
                attempt: AttemptKind::ForceRecheck,
            } => RenderedNotice::plain(
                "🔄 <b>Force Refreshing...</b>\n\nClearing cache and doing deep verification...",
            ),
            Notice::Checking { .. } => RenderedNotice::plain(
                "🔄 <b>Checking membership...</b>\n\nPlease wait while we verify your status...",
            ),
            Notice::Verified {
                attempt: AttemptKind::ForceRecheck,
            } => RenderedNotice::plain("🎉 <b>Force Refresh Successful!</b> Sending content..."),
            Notice::Verified { .. } => RenderedNotice::plain(
                "✅ <b>Success!</b> Membership verified! Sending your content now...",
            ),
            Notice::Exhausted { user_id, .. } => RenderedNotice {
                text: format!(
                    "❌ <b>Force Refresh Failed</b>\n\n\
                     We still can't detect your membership in {channel}.\n\n\
                     <b>Possible solutions:</b>\n\
                     • Leave the channel completely\n\
                     • Wait 2 minutes\n\
                     • Join again\n\
                     • Try again after 5 minutes\n\n\
                     <b>Or contact support with your User ID:</b> <code>{user_id}</code>"
                ),
                keyboard: self.exhausted_keyboard(),
            },
            Notice::NotFound => RenderedNotice::plain(
                "❌ Content not found or expired. Please get a new link from the channel.",
            ),
            Notice::DeliveryFailed => RenderedNotice::plain(
                "❌ Error sending content. Please try again later or contact support.",
            ),
            Notice::LinkIssued {
                handle,
                link,
                issued_at,
            } => RenderedNotice::plain(format!(
                "🔗 <b>New Content Generated!</b>\n\n\
                 📋 <b>Details:</b>\n\
                 • Type: {}\n\
                 • ID: <code>{}</code>\n\
                 • Status: ✅ Ready\n\
                 • Timestamp: {issued_at}\n\n\
                 🔗 <b>Share Link:</b>\n<code>{}</code>\n\n\
                 👆 Copy this link and share it in your main channel!",
                media_label(handle.kind),
                handle.id,
                encode_text(link)
            )),
        }
    }

    /// Join, recheck and force-recheck buttons.
    #[must_use]
    pub fn challenge_keyboard(&self, asset_id: AssetId) -> InlineKeyboardMarkup {
        let mut rows = Vec::with_capacity(3);
        if let Some(url) = &self.join_url {
            rows.push(vec![InlineKeyboardButton::url(JOIN_BUTTON, url.clone())]);
        }
        rows.push(vec![InlineKeyboardButton::callback(
            RECHECK_BUTTON,
            CallbackAction::Recheck(asset_id).encode(),
        )]);
        rows.push(vec![InlineKeyboardButton::callback(
            FORCE_RECHECK_BUTTON,
            CallbackAction::ForceRecheck(asset_id).encode(),
        )]);
        InlineKeyboardMarkup::new(rows)
    }

    /// Join and support buttons, when any URL is configured.
    #[must_use]
    pub fn exhausted_keyboard(&self) -> Option<InlineKeyboardMarkup> {
        let rows: Vec<Vec<InlineKeyboardButton>> = [
            self.join_url.as_ref().map(|u| (JOIN_BUTTON, u)),
            self.support_url.as_ref().map(|u| (SUPPORT_BUTTON, u)),
        ]
        .into_iter()
        .flatten()
        .map(|(label, url)| vec![InlineKeyboardButton::url(label, url.clone())])
        .collect();

        if rows.is_empty() {
            None
        } else {
            Some(InlineKeyboardMarkup::new(rows))
        }
    }

    /// `/debug` output.
    #[must_use]
    pub fn diagnostics_text(&self, ctx: &DebugContext, snapshot: &Diagnostics) -> String {
        let mut text = String::from("🔧 <b>Debug Information</b>\n\n");

        let _ = writeln!(text, "<b>Chat Details:</b>");
        let _ = writeln!(text, "• Chat ID: <code>{}</code>", ctx.chat_id);
        let _ = writeln!(text, "• Chat Type: <code>{}</code>", ctx.chat_kind);
        let _ = writeln!(
            text,
            "• Chat Title: {}\n",
            encode_text(ctx.chat_title.as_deref().unwrap_or("N/A"))
        );

        let _ = writeln!(text, "<b>User Details:</b>");
        let _ = writeln!(text, "• User ID: <code>{}</code>", ctx.user_id);
        let _ = writeln!(
            text,
            "• Username: @{}",
            encode_text(ctx.username.as_deref().unwrap_or("None"))
        );
        let _ = writeln!(text, "• First Name: {}\n", encode_text(&ctx.first_name));

        let _ = writeln!(text, "<b>Bot Status:</b>");
        let _ = writeln!(text, "• Media Store Size: {}", snapshot.registry_size);
        let _ = writeln!(text, "• Cache Entries: {}", snapshot.cache_size);
        let _ = writeln!(text, "• Main Channel: {}", encode_text(&self.channel_label));
        let _ = writeln!(
            text,
            "• Content Channel ID: <code>{}</code>",
            self.content_channel_id
        );
        if snapshot.misconfigured_lookups > 0 {
            let _ = writeln!(
                text,
                "• ⚠️ Channel access errors: {}",
                snapshot.misconfigured_lookups
            );
        }

        if let Some(live) = snapshot.live_check {
            let _ = writeln!(text, "\n<b>🔍 Membership Check:</b>");
            let status = if live.status == MembershipStatus::Member {
                "✅ Member"
            } else {
                "❌ Not Member"
            };
            let _ = writeln!(text, "• Status: {status}");
            let _ = writeln!(text, "• Check Time: {:.2}s", live.elapsed.as_secs_f64());
            match snapshot.cached {
                Some(entry) => {
                    let _ = writeln!(
                        text,
                        "• Cache Status: ✅ Cached ({:.1}s old)",
                        entry.age().as_secs_f64()
                    );
                }
                None => {
                    let _ = writeln!(text, "• Cache Status: ❌ Not Cached");
                }
            }
        }

        text
    }

    /// `/testchannel` success output.
    #[must_use]
    pub fn channel_probe_text(probe: &ChannelProbe) -> String {
        format!(
            "🔍 <b>Channel Access Test</b>\n\n\
             ✅ <b>Channel Found!</b>\n\
             • Channel: {}\n\
             • Title: {}\n\
             • Type: {}\n\
             • ID: <code>{}</code>\n\
             • Members: {}\n\
             • Administrators: {}\n\
             • Bot is Admin: {}",
            encode_text(&probe.label),
            encode_text(probe.title.as_deref().unwrap_or("N/A")),
            probe.chat_kind,
            probe.chat_id,
            probe.member_count,
            probe.admin_count,
            if probe.bot_is_admin { "✅ Yes" } else { "❌ No" }
        )
    }

    /// `/testchannel` failure output.
    #[must_use]
    pub fn channel_probe_failed(&self, error: &str) -> String {
        let channel = encode_text(&self.channel_label);
        format!(
            "❌ <b>Channel Access Failed</b>\n\n\
             Error: <code>{}</code>\n\n\
             <b>Solutions:</b>\n\
             1. Add bot to {channel} as admin\n\
             2. Give bot 'Read Messages' permission\n\
             3. Make sure channel username is correct",
            encode_text(error)
        )
    }

    /// `/clearcache` output.
    #[must_use]
    pub fn cache_cleared(removed: usize) -> String {
        format!("🗑️ <b>Cache Cleared!</b>\n\nRemoved {removed} cached entries.")
    }
}

/// Caption attached to delivered media.
#[must_use]
pub const fn media_caption(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Photo => "📸 Here's your requested image! Thank you for being a member!",
        MediaKind::Video => "🎥 Here's your requested video! Thank you for being a member!",
    }
}

/// Human-readable media type.
#[must_use]
pub const fn media_label(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Photo => "📸 Photo",
        MediaKind::Video => "🎥 Video",
    }
}

fn parse_url(what: &str, raw: Option<String>) -> Option<Url> {
    let raw = raw.filter(|s| !s.trim().is_empty())?;
    match Url::parse(raw.trim()) {
        Ok(url) => Some(url),
        Err(e) => {
            warn!("Ignoring invalid {what} URL {raw:?}: {e}");
            None
        }
    }
}
