use serde::{Deserialize, Serialize};

/// Climbing style of a route.
///
/// `Unknown` collects source values outside the store enumeration and is
/// not itself a member of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClimbingType {
    Bouldering,
    Trad,
    Sport,
    TopRope,
    Winter,
    Dws,
    Scrambling,
    Mixed,
    BoulderCircuit,
    Aid,
    Ice,
    Alpine,
    ViaFerrata,
    Unknown,
}

impl ClimbingType {
    /// Store enumeration members, in declaration order
    pub const MEMBERS: [ClimbingType; 13] = [
        ClimbingType::Bouldering,
        ClimbingType::Trad,
        ClimbingType::Sport,
        ClimbingType::TopRope,
        ClimbingType::Winter,
        ClimbingType::Dws,
        ClimbingType::Scrambling,
        ClimbingType::Mixed,
        ClimbingType::BoulderCircuit,
        ClimbingType::Aid,
        ClimbingType::Ice,
        ClimbingType::Alpine,
        ClimbingType::ViaFerrata,
    ];

    pub fn parse(s: &str) -> Option<Self> {
        Self::MEMBERS.iter().copied().find(|m| m.as_str() == s)
    }

    /// Parse a source value, sending anything unrecognised to `Unknown`
    pub fn parse_lenient(s: &str) -> Self {
        Self::parse(s).unwrap_or(ClimbingType::Unknown)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ClimbingType::Bouldering => "Bouldering",
            ClimbingType::Trad => "Trad",
            ClimbingType::Sport => "Sport",
            ClimbingType::TopRope => "Top Rope",
            ClimbingType::Winter => "Winter",
            ClimbingType::Dws => "DWS",
            ClimbingType::Scrambling => "Scrambling",
            ClimbingType::Mixed => "Mixed",
            ClimbingType::BoulderCircuit => "Boulder Circuit",
            ClimbingType::Aid => "Aid",
            ClimbingType::Ice => "Ice",
            ClimbingType::Alpine => "Alpine",
            ClimbingType::ViaFerrata => "Via Ferrata",
            ClimbingType::Unknown => "UNKNOWN",
        }
    }

    /// Value written to the store, `None` when outside the enumeration
    pub fn store_value(&self) -> Option<&'static str> {
        match self {
            ClimbingType::Unknown => None,
            other => Some(other.as_str()),
        }
    }

    /// Labels of the categorical column, store members first
    pub fn categories() -> Vec<&'static str> {
        Self::MEMBERS
            .iter()
            .map(|m| m.as_str())
            .chain(std::iter::once(ClimbingType::Unknown.as_str()))
            .collect()
    }

    pub fn category_code(&self) -> i32 {
        match self {
            ClimbingType::Unknown => Self::MEMBERS.len() as i32,
            member => Self::MEMBERS
                .iter()
                .position(|m| m == member)
                .map_or(Self::MEMBERS.len() as i32, |p| p as i32),
        }
    }
}

impl std::fmt::Display for ClimbingType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Rock type of a crag. `Unknown` is the catalogue's own "UNKNOWN" member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RockType {
    Gritstone,
    Limestone,
    SandstoneHard,
    Granite,
    GritQuarried,
    SandstoneSoft,
    Rhyolite,
    Unknown,
    Artificial,
    Culm,
    Slate,
    Greenstone,
    VolcanicTuff,
    Dolerite,
    Andesite,
    Gabbro,
    KillasSlate,
    MicaSchist,
    Shale,
    PillowLava,
    Conglomerate,
    Chalk,
    Schist,
    AmphibioliteAndS,
    WeldedTuff,
    Quartzite,
    CrumblyRubbish,
    Hornstone,
    Basalt,
    Diorites,
    WelshIgneous,
    Ice,
    Serpentine,
    IronRock,
    Ignimbrite,
    Microgranite,
    Psammite,
}

impl RockType {
    pub const MEMBERS: [RockType; 37] = [
        RockType::Gritstone,
        RockType::Limestone,
        RockType::SandstoneHard,
        RockType::Granite,
        RockType::GritQuarried,
        RockType::SandstoneSoft,
        RockType::Rhyolite,
        RockType::Unknown,
        RockType::Artificial,
        RockType::Culm,
        RockType::Slate,
        RockType::Greenstone,
        RockType::VolcanicTuff,
        RockType::Dolerite,
        RockType::Andesite,
        RockType::Gabbro,
        RockType::KillasSlate,
        RockType::MicaSchist,
        RockType::Shale,
        RockType::PillowLava,
        RockType::Conglomerate,
        RockType::Chalk,
        RockType::Schist,
        RockType::AmphibioliteAndS,
        RockType::WeldedTuff,
        RockType::Quartzite,
        RockType::CrumblyRubbish,
        RockType::Hornstone,
        RockType::Basalt,
        RockType::Diorites,
        RockType::WelshIgneous,
        RockType::Ice,
        RockType::Serpentine,
        RockType::IronRock,
        RockType::Ignimbrite,
        RockType::Microgranite,
        RockType::Psammite,
    ];

    pub fn parse(s: &str) -> Option<Self> {
        Self::MEMBERS.iter().copied().find(|m| m.as_str() == s)
    }

    pub fn parse_lenient(s: &str) -> Self {
        Self::parse(s).unwrap_or(RockType::Unknown)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RockType::Gritstone => "Gritstone",
            RockType::Limestone => "Limestone",
            RockType::SandstoneHard => "Sandstone (hard)",
            RockType::Granite => "Granite",
            RockType::GritQuarried => "Grit (quarried)",
            RockType::SandstoneSoft => "Sandstone (soft)",
            RockType::Rhyolite => "Rhyolite",
            RockType::Unknown => "UNKNOWN",
            RockType::Artificial => "Artificial",
            RockType::Culm => "Culm",
            RockType::Slate => "Slate",
            RockType::Greenstone => "Greenstone",
            RockType::VolcanicTuff => "Volcanic tuff",
            RockType::Dolerite => "Dolerite",
            RockType::Andesite => "Andesite",
            RockType::Gabbro => "Gabbro",
            RockType::KillasSlate => "Killas slate",
            RockType::MicaSchist => "Mica schist",
            RockType::Shale => "Shale",
            RockType::PillowLava => "Pillow lava",
            RockType::Conglomerate => "Conglomerate",
            RockType::Chalk => "Chalk",
            RockType::Schist => "Schist",
            RockType::AmphibioliteAndS => "Amphibiolite & S",
            RockType::WeldedTuff => "Welded Tuff",
            RockType::Quartzite => "Quartzite",
            RockType::CrumblyRubbish => "Crumbly rubbish",
            RockType::Hornstone => "Hornstone",
            RockType::Basalt => "Basalt",
            RockType::Diorites => "Diorites",
            RockType::WelshIgneous => "Welsh igneous",
            RockType::Ice => "Ice",
            RockType::Serpentine => "Serpentine",
            RockType::IronRock => "Iron Rock",
            RockType::Ignimbrite => "Ignimbrite",
            RockType::Microgranite => "Microgranite",
            RockType::Psammite => "Psammite",
        }
    }

    pub fn categories() -> Vec<&'static str> {
        Self::MEMBERS.iter().map(|m| m.as_str()).collect()
    }

    pub fn category_code(&self) -> i32 {
        Self::MEMBERS
            .iter()
            .position(|m| m == self)
            .map_or(0, |p| p as i32)
    }
}

impl std::fmt::Display for RockType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// SQL `CREATE TYPE ... AS ENUM` body for a member list
pub fn enum_type_sql(name: &str, members: &[&str]) -> String {
    let quoted: Vec<String> = members
        .iter()
        .map(|m| format!("'{}'", m.replace('\'', "''")))
        .collect();
    format!("CREATE TYPE \"{}\" AS ENUM ({});", name, quoted.join(", "))
}
