//! Parsing of textual build specifications (Showdown sets).
//!
//! Only the parts the trade pipeline inspects are interpreted here: the
//! species/nickname/item header, the language line, egg markers, trainer
//! overrides and `.Version=` batch commands. Every line is kept so the
//! legality engine sees the full request.

use linktrade_utils_string::strip_code_fence;

use crate::record::Language;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("the build specification is empty")]
    Empty,
    #[error("could not identify the species from '{0}'")]
    UnknownSpecies(String),
}

/// A parsed build specification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSpec {
    pub species: u16,
    /// Species as written in the header, form suffix included.
    pub species_text: String,
    pub nickname: String,
    pub held_item: Option<String>,
    pub gender: Option<char>,
    /// Value of an explicit `Language:` line, when it parsed.
    pub language: Option<Language>,
    pub is_egg: bool,
    pub shiny: bool,
    /// A `.Version=` batch command pins the origin game.
    pub version_specified: bool,
    /// The request carries its own OT / TID / SID.
    pub trainer_override: bool,
    lines: Vec<String>,
    invalid_lines: Vec<String>,
}

impl BuildSpec {
    /// Parse `text`, resolving the species name with `resolve_species`.
    pub fn parse<F>(text: &str, resolve_species: F) -> Result<Self, ParseError>
    where
        F: Fn(&str) -> Option<u16>,
    {
        let text = strip_code_fence(text);
        let lines: Vec<String> = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect();
        let Some(header) = lines.first() else {
            return Err(ParseError::Empty);
        };

        let header = parse_header(header);
        let mut is_egg = header.nickname.eq_ignore_ascii_case("egg");
        let species_text = header.species.clone();
        let species = resolve_species(&species_text)
            .filter(|id| *id != 0)
            .ok_or_else(|| ParseError::UnknownSpecies(species_text.clone()))?;

        let mut spec = BuildSpec {
            species,
            species_text,
            nickname: if is_egg {
                String::new()
            } else {
                header.nickname
            },
            held_item: header.item,
            gender: header.gender,
            language: None,
            is_egg: false,
            shiny: false,
            version_specified: false,
            trainer_override: false,
            lines: Vec::new(),
            invalid_lines: Vec::new(),
        };

        for line in lines.iter().skip(1) {
            if let Some(value) = value_of(line, "Language") {
                match value.parse::<Language>() {
                    Ok(lang) => spec.language = Some(lang),
                    Err(_) => spec.invalid_lines.push(line.clone()),
                }
            } else if let Some(value) = value_of(line, "Shiny") {
                spec.shiny = is_yes(value);
            } else if let Some(value) = value_of(line, "Egg").or_else(|| value_of(line, "IsEgg")) {
                is_egg |= is_yes(value);
            } else if value_of(line, "OT").is_some()
                || value_of(line, "TID").is_some()
                || value_of(line, "SID").is_some()
            {
                spec.trainer_override = true;
            } else if line
                .get(..9)
                .is_some_and(|prefix| prefix.eq_ignore_ascii_case(".Version="))
            {
                spec.version_specified = true;
            }
        }
        spec.is_egg = is_egg;
        spec.lines = lines;
        Ok(spec)
    }

    /// All non-empty lines of the request, header first.
    pub fn set_lines(&self) -> &[String] {
        &self.lines
    }

    /// Lines that were recognized but carried an unusable value.
    pub fn invalid_lines(&self) -> &[String] {
        &self.invalid_lines
    }

    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

struct Header {
    nickname: String,
    species: String,
    gender: Option<char>,
    item: Option<String>,
}

/// `Nickname (Species) (M) @ Item`, where nickname, gender and item are optional.
fn parse_header(line: &str) -> Header {
    let (left, item) = match line.split_once(" @ ") {
        Some((left, item)) => (left.trim(), Some(item.trim().to_string())),
        None => (line.trim(), None),
    };

    let mut left = left.to_string();
    let mut gender = None;
    for (suffix, g) in [("(M)", 'M'), ("(F)", 'F')] {
        if let Some(rest) = left.strip_suffix(suffix) {
            gender = Some(g);
            left = rest.trim_end().to_string();
        }
    }

    if let (Some(open), true) = (left.rfind('('), left.ends_with(')')) {
        let species = left[open + 1..left.len() - 1].trim().to_string();
        let nickname = left[..open].trim().to_string();
        if !species.is_empty() {
            return Header {
                nickname,
                species,
                gender,
                item: item.filter(|i| !i.is_empty()),
            };
        }
    }

    Header {
        nickname: String::new(),
        species: left,
        gender,
        item: item.filter(|i| !i.is_empty()),
    }
}

fn value_of<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let (k, v) = line.split_once(':')?;
    k.trim().eq_ignore_ascii_case(key).then(|| v.trim())
}

fn is_yes(value: &str) -> bool {
    matches!(value.to_ascii_lowercase().as_str(), "yes" | "true" | "y")
}
