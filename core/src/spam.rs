//! Advertisement detection for nicknames and trainer names.

use regex_lite::Regex;

use crate::record::EntityCore;

/// Patterns commonly used by ad-stuffed files (site names, social handles,
/// domain endings).
const AD_PATTERN: &str = r"(?i)(YT$)|(YT\w*$)|(Lab$)|(\.\w*$|\.\w*/)|(TV$)|(PKHeX)|(FB:)|(AuSLove)|(ShinyMart)|(Blainette)|( com)|( org)|( net)|(2DOS3)|(PPorg)|(Tik\wok$)|(YouTube)|(IG:)|(TTV )|(Tools)|(JokersWrath)|(bot$)|(PKMGen)|(TheHighTable)";

#[derive(Debug, Clone)]
pub struct AdNameFilter {
    pattern: Regex,
}

impl AdNameFilter {
    pub fn new() -> Self {
        #[allow(clippy::expect_used)]
        let pattern = Regex::new(AD_PATTERN).expect("advertisement pattern compiles");
        Self { pattern }
    }

    /// Returns the offending text when the nickname or trainer name looks
    /// like an advertisement.
    pub fn find_ad(&self, core: &EntityCore) -> Option<String> {
        [&core.nickname, &core.original_trainer.name]
            .into_iter()
            .filter(|name| !name.is_empty())
            .find(|name| self.is_ad(name))
            .cloned()
    }

    pub fn is_ad(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }
}

impl Default for AdNameFilter {
    fn default() -> Self {
        Self::new()
    }
}
