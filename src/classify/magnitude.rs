//! Damage Magnitude Resolver
//! Converts magnitude suffix codes (K/M/B) into dollar multipliers.

pub const THOUSAND: u64 = 1_000;
pub const MILLION: u64 = 1_000_000;
pub const BILLION: u64 = 1_000_000_000;

/// One step of the multiplier chain.
struct MultiplierRule {
    matches: fn(Option<&str>) -> bool,
    multiplier: u64,
}

fn contains_ci(code: Option<&str>, letter: char) -> bool {
    code.is_some_and(|c| c.chars().any(|ch| ch.eq_ignore_ascii_case(&letter)))
}

fn is_absent(code: Option<&str>) -> bool {
    code.is_none()
}

fn is_unrecognized(code: Option<&str>) -> bool {
    !has_thousand(code) && !has_million(code) && !has_billion(code)
}

fn has_thousand(code: Option<&str>) -> bool {
    contains_ci(code, 'K')
}

fn has_million(code: Option<&str>) -> bool {
    contains_ci(code, 'M')
}

fn has_billion(code: Option<&str>) -> bool {
    contains_ci(code, 'B')
}

/// Evaluated in order; a later match overwrites the multiplier chosen by an
/// earlier one.
const MULTIPLIER_RULES: [MultiplierRule; 5] = [
    MultiplierRule { matches: is_absent, multiplier: 1 },
    MultiplierRule { matches: is_unrecognized, multiplier: 1 },
    MultiplierRule { matches: has_thousand, multiplier: THOUSAND },
    MultiplierRule { matches: has_million, multiplier: MILLION },
    MultiplierRule { matches: has_billion, multiplier: BILLION },
];

/// Resolves damage figures into dollar amounts.
pub struct MagnitudeResolver;

impl MagnitudeResolver {
    /// Multiplier for a magnitude code. Total: every input yields one of
    /// 1, 1e3, 1e6 or 1e9.
    pub fn unit_multiplier(code: Option<&str>) -> u64 {
        let code = code.map(str::trim).filter(|c| !c.is_empty());
        MULTIPLIER_RULES.iter().fold(1, |current, rule| {
            if (rule.matches)(code) {
                rule.multiplier
            } else {
                current
            }
        })
    }

    /// Dollar amount for a damage figure and its magnitude code.
    pub fn dollars(figure: f64, code: Option<&str>) -> f64 {
        figure * Self::unit_multiplier(code) as f64
    }
}
