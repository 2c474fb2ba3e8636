//! Prompt-driven login and routing of incoming text.
//!
//! Cluster nodes greet with a prompt such as `login:` or `Please enter your
//! call:`, optionally ask for a password, and finally print a ready banner
//! (`... 1650Z dxspider >`). The automaton answers prompts with the configured
//! credentials and flips to authenticated once a ready banner shows up.

/// Prompt suffixes that ask for the username.
pub const USERNAME_PROMPTS: &[&str] = &["callsign:", "call:", "login:"];

/// Prompt suffixes that ask for the password.
pub const PASSWORD_PROMPTS: &[&str] = &["password:"];

/// Ready banners of common cluster software (CW Skimmer, DXSpider, AR-Cluster, CC Cluster).
pub const READY_BANNERS: &[&str] = &["z cwskimmer >", "z dxspider >", "z arc6>", "ccc >"];

/// Line terminator appended to every reply.
pub const LINE_TERMINATOR: &str = "\r\n";

/// The marker sets recognized by the login automaton.
///
/// Markers are matched against the trimmed, lowercased text unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginConfig {
    pub username_prompts: Vec<String>,
    pub password_prompts: Vec<String>,
    pub ready_banners: Vec<String>,
}

impl Default for LoginConfig {
    fn default() -> Self {
        let owned = |markers: &[&str]| markers.iter().map(|m| m.to_string()).collect();
        Self {
            username_prompts: owned(USERNAME_PROMPTS),
            password_prompts: owned(PASSWORD_PROMPTS),
            ready_banners: owned(READY_BANNERS),
        }
    }
}

impl LoginConfig {
    /// Add a ready banner for cluster software not covered by the defaults.
    pub fn with_ready_banner(mut self, banner: impl Into<String>) -> Self {
        self.ready_banners.push(banner.into().to_lowercase());
        self
    }
}

/// Username and password sent in reply to prompts.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Outcome of feeding one text unit to the automaton.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginStep {
    /// Text to write back to the server, terminator included.
    pub reply: Option<String>,
    /// The authentication flag after this step.
    pub authenticated: bool,
}

/// The login automaton.
#[derive(Debug, Clone)]
pub struct Login {
    config: LoginConfig,
    credentials: Credentials,
}

impl Login {
    pub fn new(config: LoginConfig, credentials: Credentials) -> Self {
        Self {
            config,
            credentials,
        }
    }

    /// Decide how to answer a normalized text unit.
    ///
    /// Rules apply only while unauthenticated; first match wins.
    pub fn step(&self, authenticated: bool, text: &str) -> LoginStep {
        let unchanged = LoginStep {
            reply: None,
            authenticated,
        };
        if authenticated {
            return unchanged;
        }

        if ends_with_any(text, &self.config.username_prompts) {
            LoginStep {
                reply: Some(format!("{}{}", self.credentials.username, LINE_TERMINATOR)),
                authenticated,
            }
        } else if ends_with_any(text, &self.config.password_prompts) {
            LoginStep {
                reply: Some(format!("{}{}", self.credentials.password, LINE_TERMINATOR)),
                authenticated,
            }
        } else if ends_with_any(text, &self.config.ready_banners) {
            LoginStep {
                reply: None,
                authenticated: true,
            }
        } else {
            unchanged
        }
    }

    /// Route one raw text unit from the stream.
    ///
    /// Blank units are ignored. Before authentication the unit goes to the
    /// automaton; afterwards it is handed on as content for spot extraction.
    pub fn route(&self, authenticated: bool, raw: &str) -> Incoming {
        let text = normalize(raw);
        if text.is_empty() {
            Incoming::Empty
        } else if authenticated {
            Incoming::Content(text)
        } else {
            Incoming::Login(self.step(authenticated, &text))
        }
    }
}

/// Where an incoming text unit ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming {
    /// Nothing but whitespace.
    Empty,
    /// Consumed by the login automaton.
    Login(LoginStep),
    /// Normalized authenticated text, ready for spot extraction.
    Content(String),
}

/// Trim surrounding whitespace and lowercase.
pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

fn ends_with_any(text: &str, suffixes: &[String]) -> bool {
    suffixes.iter().any(|suffix| text.ends_with(suffix.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn login() -> Login {
        Login::new(LoginConfig::default(), Credentials::new("dl1abc", "secret"))
    }

    #[test]
    fn test_username_prompts() {
        let login = login();
        for prompt in ["login:", "please enter your call:", "your callsign:"] {
            let step = login.step(false, prompt);
            assert_eq!(step.reply.as_deref(), Some("dl1abc\r\n"), "{prompt}");
            assert!(!step.authenticated);
        }
    }

    #[test]
    fn test_password_prompt() {
        let step = login().step(false, "password:");
        assert_eq!(step.reply.as_deref(), Some("secret\r\n"));
        assert!(!step.authenticated);
    }

    #[test]
    fn test_ready_banners_authenticate() {
        let login = login();
        for banner in [
            "dl1abc de skimmer 1650z cwskimmer >",
            "dl1abc de db0sue-7 18-oct-2026 1650z dxspider >",
            "ar-cluster 1650z arc6>",
            "welcome ccc >",
        ] {
            let step = login.step(false, banner);
            assert_eq!(step.reply, None, "{banner}");
            assert!(step.authenticated, "{banner}");
        }
    }

    #[test]
    fn test_unmatched_text_is_silent() {
        let step = login().step(false, "welcome to the cluster");
        assert_eq!(
            step,
            LoginStep {
                reply: None,
                authenticated: false
            }
        );
    }

    #[test]
    fn test_authenticated_bypasses_rules() {
        let step = login().step(true, "login:");
        assert_eq!(step.reply, None);
        assert!(step.authenticated);
    }

    #[test]
    fn test_prompt_must_be_suffix() {
        let step = login().step(false, "login: is required below");
        assert_eq!(step.reply, None);
    }

    #[test]
    fn test_full_login_sequence() {
        let login = login();
        let mut authenticated = false;
        let mut replies = Vec::new();

        for raw in ["Welcome\r\nlogin: ", "Password: ", "Hello DL1ABC\r\nCCC >"] {
            match login.route(authenticated, raw) {
                Incoming::Login(step) => {
                    replies.extend(step.reply);
                    authenticated = step.authenticated;
                }
                other => panic!("unexpected route: {other:?}"),
            }
        }

        assert_eq!(replies, vec!["dl1abc\r\n", "secret\r\n"]);
        assert!(authenticated);
    }

    #[test]
    fn test_route_ignores_blank_units() {
        let login = login();
        assert_eq!(login.route(false, ""), Incoming::Empty);
        assert_eq!(login.route(true, " \r\n\t"), Incoming::Empty);
    }

    #[test]
    fn test_route_hands_content_on_after_login() {
        let routed = login().route(true, "  DX de RX7K: 7154.0 RK7R cq 1650Z\r\n");
        assert_eq!(
            routed,
            Incoming::Content("dx de rx7k: 7154.0 rk7r cq 1650z".to_string())
        );
    }

    #[test]
    fn test_custom_ready_banner() {
        let login = Login::new(
            LoginConfig::default().with_ready_banner("MyNode>"),
            Credentials::default(),
        );
        assert!(login.step(false, "hello from mynode>").authenticated);
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let debug = format!("{:?}", Credentials::new("dl1abc", "secret"));
        assert!(debug.contains("dl1abc"));
        assert!(!debug.contains("secret"));
    }
}
