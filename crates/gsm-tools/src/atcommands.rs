//! Built-in AT command reference for `gsmterm`

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Category {
    General,
    CallControl,
    NetworkService,
    Security,
    Phonebook,
    Sms,
    SupplementaryServices,
    Data,
    Specific,
}

impl Category {
    pub const ALL: [Category; 9] = [
        Category::General,
        Category::CallControl,
        Category::NetworkService,
        Category::Security,
        Category::Phonebook,
        Category::Sms,
        Category::SupplementaryServices,
        Category::Data,
        Category::Specific,
    ];

    /// Case-insensitive lookup by display name
    pub fn from_name(name: &str) -> Option<Category> {
        Self::ALL.into_iter().find(|c| c.name().eq_ignore_ascii_case(name.trim()))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Category::General => "General",
            Category::CallControl => "Call Control",
            Category::NetworkService => "Network Service",
            Category::Security => "Security",
            Category::Phonebook => "Phonebook",
            Category::Sms => "SMS",
            Category::SupplementaryServices => "Supplementary Services",
            Category::Data => "Data",
            Category::Specific => "Specific",
        }
    }
}

/// One documented command
#[derive(Debug, Clone, Copy, Serialize)]
pub struct AtCommand {
    pub command: &'static str,
    pub category: Category,
    pub name: &'static str,
    /// Parameters as (name, accepted values)
    pub parameters: &'static [(&'static str, &'static str)],
    pub description: &'static str,
}

const fn cmd(
    command: &'static str,
    category: Category,
    name: &'static str,
    parameters: &'static [(&'static str, &'static str)],
    description: &'static str,
) -> AtCommand {
    AtCommand {
        command,
        category,
        name,
        parameters,
        description,
    }
}

use Category::*;

pub static AT_COMMANDS: &[AtCommand] = &[
    // General
    cmd("AT+CGMI", General, "Manufacturer Identification", &[], "Displays the manufacturer identification."),
    cmd("AT+CGMM", General, "Request Model Identification", &[], "Displays the model identification."),
    cmd("AT+CGMR", General, "Request Revision Identification", &[], "Displays the revised software version."),
    cmd(
        "AT+CGSN",
        General,
        "Product Serial Number",
        &[],
        "Returns the IMEI (International Mobile Equipment Identity, 15-digit number) of the product.",
    ),
    cmd(
        "AT+CSCS",
        General,
        "Select TE Character Set",
        &[("<Character Set>", "GSM - GSM default alphabet\nUCS2 - 16-bit universal character set\nHEX - hexadecimal values")],
        "Informs the ME which character set is used by the TE for short messages and other strings.",
    ),
    cmd(
        "AT+CIMI",
        General,
        "Request IMSI",
        &[],
        "Reads the IMSI (International Mobile Subscriber Identity) of the SIM card. The PIN may need to be entered first.",
    ),
    cmd("AT+CCID", General, "Card Identification", &[], "Reads the EF-CCID file on the SIM card."),
    cmd("AT+GCAP", General, "Capabilities List", &[], "Displays the complete list of capabilities."),
    cmd("AT+CLAC", General, "List All Commands", &[], "Lists the AT commands supported by the modem."),
    cmd(
        "AT+CFUN",
        General,
        "Set Phone Functionality",
        &[("<functionality level>", "0: minimum functionality; IMSI detach\n1: full functionality")],
        "Selects the level of functionality of the mobile station.",
    ),
    cmd(
        "AT+CPAS",
        General,
        "Phone Activity Status",
        &[],
        "Returns the activity status: 0 ready, 1 unavailable, 2 unknown, 3 ringing, 4 call in progress, 5 asleep.",
    ),
    cmd(
        "AT+CMEE",
        General,
        "Report Mobile Equipment Errors",
        &[("<error reporting flag>", "0: ERROR only\n1: +CME ERROR: <xxx> / +CMS ERROR: <xxx>\n2: verbose error strings")],
        "Enables or disables numeric +CME ERROR / +CMS ERROR result codes.",
    ),
    cmd(
        "AT+CCLK",
        General,
        "Clock Management",
        &[("<date and time string>", "\"yy/MM/dd,hh:mm:ss\"")],
        "Sets or gets the date and time of the ME real-time clock.",
    ),
    cmd("ATZ", General, "Reset", &[], "Restores the default configuration profile."),
    cmd(
        "ATE",
        General,
        "Echo",
        &[("<value>", "0: echo off\n1: echo on")],
        "Determines whether the modem echoes characters received from the TE.",
    ),
    // Call control
    cmd(
        "ATD",
        CallControl,
        "Dial Command",
        &[("<nb>", "Number to dial; end with ';' for a voice call")],
        "Sets up an outgoing call.",
    ),
    cmd("ATH", CallControl, "Hang-Up Command", &[], "Ends the current call."),
    cmd("ATA", CallControl, "Answer a Call", &[], "Answers an incoming call."),
    cmd(
        "AT+CLCC",
        CallControl,
        "List Current Calls",
        &[],
        "Lists current calls: +CLCC: <id>,<dir>,<stat>,<mode>,<mpty>[,<number>,<type>]. \
         Stat: 0 active, 1 held, 2 dialling, 3 alerting, 4 incoming, 5 waiting.",
    ),
    cmd(
        "AT+VTS",
        CallControl,
        "DTMF Signals",
        &[("<Tone>", "0-9, *, #, A, B, C, D")],
        "Sends a DTMF tone during a call.",
    ),
    cmd(
        "AT+CRC",
        CallControl,
        "Cellular Result Codes",
        &[("<mode>", "0: RING\n1: +CRING: <type>")],
        "Enables extended incoming call indications.",
    ),
    cmd(
        "AT+CLIP",
        CallControl,
        "Calling Line Identification Presentation",
        &[("<n>", "0: disable\n1: enable")],
        "Enables the +CLIP notification with the caller's number on incoming calls.",
    ),
    cmd(
        "AT+CVHU",
        CallControl,
        "Voice Hang-Up Control",
        &[("<mode>", "0: ATH ends voice calls\n1: ATH is ignored during voice calls")],
        "Selects whether ATH disconnects voice calls.",
    ),
    // Network service
    cmd(
        "AT+CSQ",
        NetworkService,
        "Signal Quality",
        &[],
        "Returns +CSQ: <rssi>,<ber>. RSSI 0-31 (99 = unknown), BER 0-7 (99 = unknown).",
    ),
    cmd(
        "AT+COPS",
        NetworkService,
        "Operator Selection",
        &[("<mode>", "0: automatic\n1: manual\n2: deregister\n3: set format\n4: manual then automatic")],
        "Selects or reads the network operator.",
    ),
    cmd(
        "AT+CREG",
        NetworkService,
        "Network Registration",
        &[("<mode>", "0: disable notifications\n1: enable +CREG: <stat>\n2: enable with location")],
        "Returns the registration status: 0 not registered, 1 home network, 2 searching, 3 denied, 4 unknown, 5 roaming.",
    ),
    cmd(
        "AT+CPOL",
        NetworkService,
        "Preferred Operator List",
        &[],
        "Edits the SIM preferred list of networks.",
    ),
    // Security
    cmd(
        "AT+CPIN",
        Security,
        "Enter PIN",
        &[("<Pin>", "Four to eight digits")],
        "Enters the SIM PIN, or reports whether one is needed: READY, SIM PIN, SIM PUK.",
    ),
    cmd(
        "AT+CLCK",
        Security,
        "Facility Lock",
        &[("<fac>", "\"SC\": SIM PIN\n\"AO\": barr outgoing calls\n\"AI\": barr incoming calls")],
        "Locks, unlocks or interrogates a facility.",
    ),
    cmd(
        "AT+CPWD",
        Security,
        "Change Password",
        &[("<fac>", "Facility"), ("<oldpwd>", "Old password"), ("<newpwd>", "New password")],
        "Changes a facility password such as the SIM PIN.",
    ),
    // Phonebook
    cmd(
        "AT+CPBS",
        Phonebook,
        "Select Phonebook Memory Storage",
        &[("<storage>", "\"SM\": SIM\n\"ME\": phone\n\"ON\": own numbers (MSISDN)")],
        "Selects the phonebook used by the other phonebook commands.",
    ),
    cmd(
        "AT+CPBR",
        Phonebook,
        "Read Phonebook Entries",
        &[("<first entry>", "Index"), ("<last entry>", "Optional index")],
        "Reads phonebook entries from the selected storage.",
    ),
    cmd(
        "AT+CPBW",
        Phonebook,
        "Write Phonebook Entry",
        &[("<index>", "Entry index"), ("<number>", "Phone number"), ("<type>", "129 or 145"), ("<text>", "Name")],
        "Writes or deletes a phonebook entry.",
    ),
    cmd("AT+CNUM", Phonebook, "Subscriber Number", &[], "Returns the MSISDN(s) of the subscriber."),
    // SMS
    cmd(
        "AT+CSMS",
        Sms,
        "Select Message Service",
        &[("<service>", "0: phase 2\n1: phase 2+")],
        "Selects the SMS message service.",
    ),
    cmd(
        "AT+CPMS",
        Sms,
        "Preferred Message Storage",
        &[("<mem1>", "Read/delete storage"), ("<mem2>", "Write/send storage"), ("<mem3>", "Receive storage")],
        "Selects the memory storages for reading, writing and receiving messages: SM, ME, MT, SR.",
    ),
    cmd(
        "AT+CMGF",
        Sms,
        "Preferred Message Format",
        &[("<mode>", "0: PDU mode\n1: text mode")],
        "Selects the format of messages.",
    ),
    cmd(
        "AT+CSCA",
        Sms,
        "Service Centre Address",
        &[("<sca>", "SMSC number"), ("<tosca>", "Type of address, 145 for international")],
        "Sets or reads the SMS service centre address.",
    ),
    cmd(
        "AT+CSMP",
        Sms,
        "Set Text Mode Parameters",
        &[("<fo>", "First octet"), ("<vp>", "Validity period"), ("<pid>", "Protocol id"), ("<dcs>", "Data coding scheme")],
        "Selects additional parameters for sending text-mode messages.",
    ),
    cmd(
        "AT+CNMI",
        Sms,
        "New Message Indication",
        &[("<mode>", "Buffering"), ("<mt>", "1: +CMTI"), ("<bm>", "Broadcasts"), ("<ds>", "1 or 2: status reports"), ("<bfr>", "Buffer flush")],
        "Selects how new messages and status reports are indicated: +CMTI, +CMT, +CDSI, +CDS.",
    ),
    cmd(
        "AT+CMGR",
        Sms,
        "Read Message",
        &[("<index>", "Storage index")],
        "Reads a stored message; an unread received message becomes read.",
    ),
    cmd(
        "AT+CMGL",
        Sms,
        "List Message",
        &[("<stat>", "Text mode: \"REC UNREAD\", \"REC READ\", \"STO UNSENT\", \"STO SENT\", \"ALL\"\nPDU mode: 0-4")],
        "Lists stored messages with the given status.",
    ),
    cmd(
        "AT+CMGS",
        Sms,
        "Send Message",
        &[("<da>", "Text mode: destination number"), ("<length>", "PDU mode: TPDU length in octets")],
        "Sends a message. The body follows the '> ' prompt and ends with Ctrl-Z.",
    ),
    cmd(
        "AT+CMGD",
        Sms,
        "Delete Message",
        &[("<index>", "Storage index"), ("<DelFlag>", "0: index only\n1: all read\n2: read and sent\n3: read, sent and unsent\n4: all")],
        "Deletes one or more stored messages.",
    ),
    // Supplementary services
    cmd(
        "AT+CUSD",
        SupplementaryServices,
        "Unstructured Supplementary Service Data",
        &[("<n>", "0: disable result code\n1: enable\n2: cancel session"), ("<str>", "USSD string"), ("<dcs>", "Data coding scheme, usually 15")],
        "Sends a USSD request; the response arrives as +CUSD: <m>,<str>,<dcs>.",
    ),
    cmd(
        "AT+CCFC",
        SupplementaryServices,
        "Call Forwarding",
        &[("<reason>", "0: unconditional\n1: busy\n2: no reply\n3: not reachable")],
        "Controls call forwarding.",
    ),
    cmd(
        "AT+CCWA",
        SupplementaryServices,
        "Call Waiting",
        &[("<n>", "0: disable\n1: enable")],
        "Controls the call waiting service.",
    ),
    // Data
    cmd(
        "AT+CGDCONT",
        Data,
        "Define PDP Context",
        &[("<cid>", "Context id"), ("<PDP_type>", "\"IP\", \"IPV6\", \"PPP\""), ("<APN>", "Access point name")],
        "Defines a packet data protocol context.",
    ),
    cmd(
        "AT+CGATT",
        Data,
        "GPRS Attach",
        &[("<state>", "0: detach\n1: attach")],
        "Attaches to or detaches from the GPRS service.",
    ),
    cmd(
        "AT+CGACT",
        Data,
        "PDP Context Activate",
        &[("<state>", "0: deactivate\n1: activate"), ("<cid>", "Context id")],
        "Activates or deactivates a PDP context.",
    ),
    // Vendor specific
    cmd(
        "AT+WIND",
        Specific,
        "Wavecom General Indications",
        &[("<IndLevel>", "Bit field; 50 enables call and SIM indications")],
        "Wavecom: enables +WIND unsolicited indications, including call progress (+WIND: 5 / +WIND: 6).",
    ),
    cmd(
        "AT^DTMF",
        Specific,
        "Huawei DTMF",
        &[("<call_x>", "Call id"), ("<dtmf_digit>", "0-9, *, #")],
        "Huawei: sends a DTMF tone on the given call.",
    ),
    cmd(
        "AT^USSDMODE",
        Specific,
        "Huawei USSD Mode",
        &[("<mode>", "0: text mode\n1: PDU mode")],
        "Huawei: selects how USSD strings are encoded.",
    ),
    cmd("AT+ZPAS", Specific, "ZTE Network Type", &[], "ZTE: reports the current network type and service domain."),
];

/// Look up a command; the `=`, `?` or `=?` suffix and letter case are ignored
pub fn lookup(command: &str) -> Option<&'static AtCommand> {
    let name = base_command(command);
    AT_COMMANDS.iter().find(|c| c.command.eq_ignore_ascii_case(name))
}

/// Commands whose name starts with `prefix`
pub fn matching(prefix: &str) -> Vec<&'static AtCommand> {
    let prefix = prefix.to_ascii_uppercase();
    AT_COMMANDS
        .iter()
        .filter(|c| c.command.to_ascii_uppercase().starts_with(&prefix))
        .collect()
}

fn base_command(command: &str) -> &str {
    let command = command.trim();
    let end = command.find(&['=', '?'][..]).unwrap_or(command.len());
    &command[..end]
}

pub fn in_category(category: Category) -> impl Iterator<Item = &'static AtCommand> {
    AT_COMMANDS.iter().filter(move |c| c.category == category)
}

/// Multi-line help text for `command`
pub fn help_text(command: &AtCommand) -> String {
    let mut text = format!(
        "{} - {}\nCategory: {}\n\n{}\n",
        command.command,
        command.name,
        command.category.name(),
        command.description
    );
    if !command.parameters.is_empty() {
        text.push_str("\nParameters:\n");
        for (name, values) in command.parameters {
            text.push_str(&format!("  {}\n", name));
            for line in values.lines() {
                text.push_str(&format!("      {}\n", line));
            }
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_ignores_suffix_and_case() {
        assert_eq!(lookup("AT+CMGS").map(|c| c.name), Some("Send Message"));
        assert_eq!(lookup("at+cmgf=1").map(|c| c.command), Some("AT+CMGF"));
        assert_eq!(lookup("AT+CPIN?").map(|c| c.command), Some("AT+CPIN"));
        assert_eq!(lookup("AT+CUSD=?").map(|c| c.command), Some("AT+CUSD"));
        assert!(lookup("AT+NOPE").is_none());
    }

    #[test]
    fn test_prefix_matching() {
        let names: Vec<_> = matching("AT+CMG").iter().map(|c| c.command).collect();
        assert_eq!(names, vec!["AT+CMGF", "AT+CMGR", "AT+CMGL", "AT+CMGS", "AT+CMGD"]);
        assert!(matching("AT+XYZ").is_empty());
    }

    #[test]
    fn test_help_lists_parameters() {
        let help = help_text(lookup("AT+CMGD").unwrap());
        assert!(help.starts_with("AT+CMGD - Delete Message"));
        assert!(help.contains("Category: SMS"));
        assert!(help.contains("<DelFlag>"));
        assert!(help.contains("      4: all"));
    }

    #[test]
    fn test_categories() {
        assert_eq!(Category::from_name("sms"), Some(Category::Sms));
        assert_eq!(Category::from_name("Call Control"), Some(Category::CallControl));
        assert_eq!(Category::from_name("fax"), None);
        assert!(in_category(Category::Security).all(|c| c.category == Category::Security));
        assert!(Category::ALL.iter().all(|c| in_category(*c).next().is_some()));
    }

    #[test]
    fn test_commands_are_unique() {
        for (i, a) in AT_COMMANDS.iter().enumerate() {
            assert!(
                AT_COMMANDS[i + 1..].iter().all(|b| b.command != a.command),
                "duplicate {}",
                a.command
            );
        }
    }
}
