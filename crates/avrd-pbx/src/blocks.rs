//! Typed builders for Asterisk config blocks.
//!
//! Every value interpolated into a config file passes an allow-listed
//! character check first, so a caller-supplied name cannot smuggle section
//! headers or dial-plan syntax into the file.

use crate::PbxError;

/// Inputs for a number's dial-plan extension block.
#[derive(Debug, Clone)]
pub struct NumberEntry {
    /// Number row id; keys the marker block.
    pub id: String,
    /// Dialable value, e.g. `+390612345678`.
    pub value: String,
    /// Agent id, used to derive the core container address.
    pub agent_id: String,
    /// Agent display label for the NoOp banner.
    pub agent_label: String,
    /// AudioSocket port of the agent's core container.
    pub port: u16,
}

/// Inputs for a SIP phone's PJSIP block.
#[derive(Debug, Clone)]
pub struct PhoneEntry {
    /// Phone row id; doubles as SIP username and section name.
    pub id: String,
    /// Optional caller-id display name.
    pub display_name: Option<String>,
    /// SIP password.
    pub password: String,
}

/// Inputs for a SIP trunk's PJSIP block.
#[derive(Debug, Clone)]
pub struct TrunkEntry {
    /// Trunk row id; doubles as the section name.
    pub id: String,
    /// Trunk display name for the caller id.
    pub name: String,
    /// SIP password for inbound and outbound auth.
    pub password: String,
}

/// Section names and usernames: letters, digits, dash, underscore.
fn check_identifier(field: &'static str, value: &str) -> Result<(), PbxError> {
    let ok = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if ok {
        Ok(())
    } else {
        Err(PbxError::InvalidValue {
            field,
            value: value.to_string(),
        })
    }
}

/// Dialable values: digits, dial-pattern letters, `+`, `*`, `#`.
fn check_dial_value(field: &'static str, value: &str) -> Result<(), PbxError> {
    let ok = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '*' | '#'));
    if ok {
        Ok(())
    } else {
        Err(PbxError::InvalidValue {
            field,
            value: value.to_string(),
        })
    }
}

/// Free text (caller-id names, NoOp banners): printable ASCII without
/// quotes, brackets, or control characters.
fn check_text(field: &'static str, value: &str) -> Result<(), PbxError> {
    let ok = value
        .chars()
        .all(|c| matches!(c, ' '..='~') && !matches!(c, '"' | '[' | ']' | '\\'));
    if ok {
        Ok(())
    } else {
        Err(PbxError::InvalidValue {
            field,
            value: value.to_string(),
        })
    }
}

/// Passwords: printable ASCII without whitespace or quotes.
fn check_password(field: &'static str, value: &str) -> Result<(), PbxError> {
    let ok = !value.is_empty()
        && value
            .chars()
            .all(|c| matches!(c, '!'..='~') && c != '"');
    if ok {
        Ok(())
    } else {
        Err(PbxError::InvalidValue {
            field,
            value: value.to_string(),
        })
    }
}

/// A dial-plan extension: one `exten =>` line followed by `same => n`
/// priority steps.
struct Extension {
    lines: Vec<String>,
}

impl Extension {
    fn new(exten: &str, first_app: String) -> Self {
        Self {
            lines: vec![format!("exten => {exten},1,{first_app}")],
        }
    }

    fn step(mut self, app: &str) -> Self {
        self.lines.push(format!(" same => n,{app}"));
        self
    }

    fn render(self) -> String {
        self.lines.join("\n")
    }
}

/// A PJSIP section: `[name]` or `[name](template)` plus `key=value` lines.
struct SipSection {
    lines: Vec<String>,
}

impl SipSection {
    fn new(name: &str, template: Option<&str>) -> Self {
        let header = match template {
            Some(t) => format!("[{name}]({t})"),
            None => format!("[{name}]"),
        };
        Self {
            lines: vec![header],
        }
    }

    fn set(mut self, key: &str, value: impl AsRef<str>) -> Self {
        self.lines.push(format!("{key}={}", value.as_ref()));
        self
    }

    fn render(self) -> String {
        self.lines.join("\n")
    }
}

/// Renders the dial-plan block answering a number and bridging the call to
/// the agent's core container over AudioSocket.
pub fn number_block(entry: &NumberEntry) -> Result<String, PbxError> {
    check_dial_value("number value", &entry.value)?;
    check_identifier("agent id", &entry.agent_id)?;
    check_text("agent label", &entry.agent_label)?;

    let extension = Extension::new(
        &entry.value,
        format!("NoOp(Number {} -> Agent {})", entry.value, entry.agent_label),
    )
    .step("Answer()")
    .step("Ringing()")
    .step("Wait(1)")
    .step("Set(UUID=${SHELL(uuidgen | tr -d '\\n')})")
    .step(&format!(
        "Dial(AudioSocket/avr-core-{}:{}/${{UUID}})",
        entry.agent_id, entry.port
    ))
    .step("Hangup()");

    Ok(extension.render())
}

/// Renders a phone's PJSIP registration block: endpoint from the WebRTC
/// template, userpass auth, and a single-contact replace-on-reconnect AOR.
pub fn phone_block(entry: &PhoneEntry) -> Result<String, PbxError> {
    check_identifier("phone id", &entry.id)?;
    check_password("phone password", &entry.password)?;

    let mut endpoint = SipSection::new(&entry.id, Some("webrtc-template"))
        .set("auth", &entry.id)
        .set("aors", &entry.id);
    if let Some(name) = entry.display_name.as_deref().filter(|n| !n.is_empty()) {
        let name = name.replace('"', "");
        check_text("phone display name", &name)?;
        endpoint = endpoint.set("callerid", format!("\"{name}\" <{}>", entry.id));
    }

    let auth = SipSection::new(&entry.id, None)
        .set("type", "auth")
        .set("auth_type", "userpass")
        .set("username", &entry.id)
        .set("password", &entry.password);

    let aor = SipSection::new(&entry.id, None)
        .set("type", "aor")
        .set("max_contacts", "1")
        .set("remove_existing", "yes");

    Ok([endpoint.render(), auth.render(), aor.render()].join("\n\n"))
}

/// Renders a trunk's PJSIP block: endpoint restricted to ulaw with inbound
/// and outbound auth, plus auth and single-contact AOR sections.
pub fn trunk_block(entry: &TrunkEntry) -> Result<String, PbxError> {
    check_identifier("trunk id", &entry.id)?;
    check_password("trunk password", &entry.password)?;

    let mut endpoint = SipSection::new(&entry.id, None)
        .set("type", "endpoint")
        .set("context", "from-trunk")
        .set("disallow", "all")
        .set("allow", "ulaw")
        .set("auth", &entry.id)
        .set("aors", &entry.id)
        .set("outbound_auth", &entry.id);
    let name = entry.name.replace('"', "");
    if !name.is_empty() {
        check_text("trunk name", &name)?;
        endpoint = endpoint.set("callerid", format!("\"{name}\" <{}>", entry.id));
    }

    let auth = SipSection::new(&entry.id, None)
        .set("type", "auth")
        .set("auth_type", "userpass")
        .set("username", &entry.id)
        .set("password", &entry.password);

    let aor = SipSection::new(&entry.id, None)
        .set("type", "aor")
        .set("max_contacts", "1")
        .set("remove_existing", "yes");

    Ok([endpoint.render(), auth.render(), aor.render()].join("\n\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_block_bridges_to_core_container() {
        let block = number_block(&NumberEntry {
            id: "n1".to_string(),
            value: "+390612345678".to_string(),
            agent_id: "a1".to_string(),
            agent_label: "support-line".to_string(),
            port: 5123,
        })
        .unwrap();

        assert!(block.starts_with(
            "exten => +390612345678,1,NoOp(Number +390612345678 -> Agent support-line)"
        ));
        assert!(block.contains(" same => n,Dial(AudioSocket/avr-core-a1:5123/${UUID})"));
        assert!(block.ends_with(" same => n,Hangup()"));
    }

    #[test]
    fn number_value_rejects_injection() {
        let err = number_block(&NumberEntry {
            id: "n1".to_string(),
            value: "+39]\nexten => _X.,1,Hangup".to_string(),
            agent_id: "a1".to_string(),
            agent_label: "x".to_string(),
            port: 5123,
        })
        .unwrap_err();
        assert!(matches!(err, PbxError::InvalidValue { .. }));
    }

    #[test]
    fn phone_block_has_three_sections() {
        let block = phone_block(&PhoneEntry {
            id: "ph1".to_string(),
            display_name: Some("Front \"Desk\"".to_string()),
            password: "s3cret".to_string(),
        })
        .unwrap();

        let expected = "[ph1](webrtc-template)\n\
                        auth=ph1\n\
                        aors=ph1\n\
                        callerid=\"Front Desk\" <ph1>\n\
                        \n\
                        [ph1]\n\
                        type=auth\n\
                        auth_type=userpass\n\
                        username=ph1\n\
                        password=s3cret\n\
                        \n\
                        [ph1]\n\
                        type=aor\n\
                        max_contacts=1\n\
                        remove_existing=yes";
        assert_eq!(block, expected);
    }

    #[test]
    fn phone_without_display_name_omits_callerid() {
        let block = phone_block(&PhoneEntry {
            id: "ph1".to_string(),
            display_name: None,
            password: "s3cret".to_string(),
        })
        .unwrap();
        assert!(!block.contains("callerid"));
    }

    #[test]
    fn trunk_block_narrows_codecs_and_authenticates_both_ways() {
        let block = trunk_block(&TrunkEntry {
            id: "t1".to_string(),
            name: "carrier-a".to_string(),
            password: "pw".to_string(),
        })
        .unwrap();

        assert!(block.contains("disallow=all\nallow=ulaw"));
        assert!(block.contains("outbound_auth=t1"));
        assert!(block.contains("callerid=\"carrier-a\" <t1>"));
        assert!(block.contains("max_contacts=1"));
    }

    #[test]
    fn newline_in_password_is_rejected() {
        let err = phone_block(&PhoneEntry {
            id: "ph1".to_string(),
            display_name: None,
            password: "bad\npassword".to_string(),
        })
        .unwrap_err();
        assert!(matches!(err, PbxError::InvalidValue { .. }));
    }
}
