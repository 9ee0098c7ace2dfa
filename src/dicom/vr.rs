//! DICOM value representations.

/// Value representation of a data element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vr {
    Ae,
    As,
    At,
    Cs,
    Da,
    Ds,
    Dt,
    Fl,
    Fd,
    Is,
    Lo,
    Lt,
    Ob,
    Ow,
    Pn,
    Sh,
    Sl,
    Sq,
    Ss,
    St,
    Tm,
    Uc,
    Ui,
    Ul,
    Un,
    Ur,
    Us,
    Ut,
}

impl Vr {
    /// Parse the two-character VR code.
    pub fn from_code(code: &[u8; 2]) -> Option<Self> {
        match code {
            b"AE" => Some(Vr::Ae),
            b"AS" => Some(Vr::As),
            b"AT" => Some(Vr::At),
            b"CS" => Some(Vr::Cs),
            b"DA" => Some(Vr::Da),
            b"DS" => Some(Vr::Ds),
            b"DT" => Some(Vr::Dt),
            b"FL" => Some(Vr::Fl),
            b"FD" => Some(Vr::Fd),
            b"IS" => Some(Vr::Is),
            b"LO" => Some(Vr::Lo),
            b"LT" => Some(Vr::Lt),
            b"OB" => Some(Vr::Ob),
            b"OW" => Some(Vr::Ow),
            b"PN" => Some(Vr::Pn),
            b"SH" => Some(Vr::Sh),
            b"SL" => Some(Vr::Sl),
            b"SQ" => Some(Vr::Sq),
            b"SS" => Some(Vr::Ss),
            b"ST" => Some(Vr::St),
            b"TM" => Some(Vr::Tm),
            b"UC" => Some(Vr::Uc),
            b"UI" => Some(Vr::Ui),
            b"UL" => Some(Vr::Ul),
            b"UN" => Some(Vr::Un),
            b"UR" => Some(Vr::Ur),
            b"US" => Some(Vr::Us),
            b"UT" => Some(Vr::Ut),
            _ => None,
        }
    }

    /// The two-character code written to the stream.
    pub fn code(self) -> &'static [u8; 2] {
        match self {
            Vr::Ae => b"AE",
            Vr::As => b"AS",
            Vr::At => b"AT",
            Vr::Cs => b"CS",
            Vr::Da => b"DA",
            Vr::Ds => b"DS",
            Vr::Dt => b"DT",
            Vr::Fl => b"FL",
            Vr::Fd => b"FD",
            Vr::Is => b"IS",
            Vr::Lo => b"LO",
            Vr::Lt => b"LT",
            Vr::Ob => b"OB",
            Vr::Ow => b"OW",
            Vr::Pn => b"PN",
            Vr::Sh => b"SH",
            Vr::Sl => b"SL",
            Vr::Sq => b"SQ",
            Vr::Ss => b"SS",
            Vr::St => b"ST",
            Vr::Tm => b"TM",
            Vr::Uc => b"UC",
            Vr::Ui => b"UI",
            Vr::Ul => b"UL",
            Vr::Un => b"UN",
            Vr::Ur => b"UR",
            Vr::Us => b"US",
            Vr::Ut => b"UT",
        }
    }

    /// Whether explicit VR encoding uses the 12-byte header form
    /// (2-byte reserved + 4-byte length) instead of the 2-byte length.
    pub fn has_long_length(self) -> bool {
        matches!(
            self,
            Vr::Ob | Vr::Ow | Vr::Sq | Vr::Uc | Vr::Un | Vr::Ur | Vr::Ut
        )
    }

    /// Padding byte for odd-length values.
    pub fn padding(self) -> u8 {
        match self {
            Vr::Ui | Vr::Ob | Vr::Un => 0x00,
            _ => b' ',
        }
    }

    /// Whether values of this VR are encoded as character strings.
    pub fn is_string(self) -> bool {
        matches!(
            self,
            Vr::Ae
                | Vr::As
                | Vr::Cs
                | Vr::Da
                | Vr::Ds
                | Vr::Dt
                | Vr::Is
                | Vr::Lo
                | Vr::Lt
                | Vr::Pn
                | Vr::Sh
                | Vr::St
                | Vr::Tm
                | Vr::Uc
                | Vr::Ui
                | Vr::Ur
                | Vr::Ut
        )
    }
}

// =============================================================================
// Tests
// =============================================================================
