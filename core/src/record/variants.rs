use super::EntityContext;
use super::EntityCore;
use super::HasHandlingTrainerLanguage;
use super::TradeRecord;
use super::layout::decode_core;
use super::layout::encode_core;

/// Scarlet / Violet record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pk9 {
    core: EntityCore,
}

impl Pk9 {
    /// Game version assigned to eggs when the request does not choose one.
    const EGG_VERSION: u8 = 50; // Scarlet

    pub fn new(core: EntityCore) -> Self {
        let mut core = core;
        core.context = Self::CONTEXT;
        Self { core }
    }

    /// Contexts whose payloads convert into this variant on decode.
    fn converts_from(context: EntityContext) -> bool {
        matches!(
            context,
            EntityContext::Gen8 | EntityContext::Gen8a | EntityContext::Gen8b
        )
    }
}

impl TradeRecord for Pk9 {
    const SIZE: usize = 0x158;
    const CONTEXT: EntityContext = EntityContext::Gen9;

    fn decode(data: &[u8]) -> Option<Self> {
        if data.len() != Self::SIZE {
            return None;
        }
        let mut core = decode_core(data)?;
        if core.context != Self::CONTEXT {
            if !Self::converts_from(core.context) {
                return None;
            }
            core.context = Self::CONTEXT;
        }
        Some(Self { core })
    }

    fn encode(&self) -> Vec<u8> {
        encode_core(&self.core, Self::SIZE, true)
    }

    fn core(&self) -> &EntityCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut EntityCore {
        &mut self.core
    }

    fn handling_language_mut(&mut self) -> Option<&mut dyn HasHandlingTrainerLanguage> {
        Some(self)
    }

    fn default_egg_version(&self) -> Option<u8> {
        Some(Self::EGG_VERSION)
    }
}

impl HasHandlingTrainerLanguage for Pk9 {
    fn handling_trainer_language(&self) -> u8 {
        self.core.handling_language
    }

    fn set_handling_trainer_language(&mut self, language: u8) {
        self.core.handling_language = language;
    }
}

/// Let's Go Pikachu / Eevee record. Cannot hold items and has no
/// handling-trainer language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pb7 {
    core: EntityCore,
}

impl Pb7 {
    pub fn new(core: EntityCore) -> Self {
        let mut core = core;
        core.context = Self::CONTEXT;
        core.handling_language = 0;
        core.held_item = 0;
        Self { core }
    }
}

impl TradeRecord for Pb7 {
    const SIZE: usize = 0x104;
    const CONTEXT: EntityContext = EntityContext::Gen7b;

    fn decode(data: &[u8]) -> Option<Self> {
        if data.len() != Self::SIZE {
            return None;
        }
        let core = decode_core(data)?;
        (core.context == Self::CONTEXT).then(|| Self::new(core))
    }

    fn encode(&self) -> Vec<u8> {
        encode_core(&self.core, Self::SIZE, false)
    }

    fn core(&self) -> &EntityCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut EntityCore {
        &mut self.core
    }

    fn supports_held_items(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn pk9_round_trips_through_its_format() {
        let mut core = EntityCore::new(EntityContext::Gen9, 133);
        core.handling_language = 5;
        let pk = Pk9::new(core);
        let bytes = pk.encode();
        assert_eq!(bytes.len(), Pk9::SIZE);
        assert_eq!(Pk9::decode(&bytes), Some(pk));
    }

    #[test]
    fn pk9_converts_switch_payloads() {
        let core = EntityCore::new(EntityContext::Gen8b, 399);
        let bytes = super::encode_core(&core, Pk9::SIZE, true);
        let pk = Pk9::decode(&bytes).expect("converted");
        assert_eq!(pk.core().context, EntityContext::Gen9);
        assert_eq!(pk.species(), 399);
    }

    #[test]
    fn pk9_refuses_lets_go_payloads() {
        let core = EntityCore::new(EntityContext::Gen7b, 25);
        let bytes = super::encode_core(&core, Pk9::SIZE, true);
        assert!(Pk9::decode(&bytes).is_none());
    }

    #[test]
    fn pb7_has_no_handling_language_capability() {
        let mut pb = Pb7::new(EntityCore::new(EntityContext::Gen7b, 25));
        assert!(pb.handling_language_mut().is_none());
        assert!(!pb.supports_held_items());
        assert_eq!(Pb7::decode(&pb.encode()), Some(pb));
    }

    #[test]
    fn decode_rejects_wrong_length() {
        let pk = Pk9::new(EntityCore::new(EntityContext::Gen9, 1));
        let mut bytes = pk.encode();
        bytes.pop();
        assert!(Pk9::decode(&bytes).is_none());
    }
}
