//! Species category tables used by the surprise-trade exclusion policy.

const MEWTWO: u16 = 150;
const KYUREM: u16 = 646;
const NECROZMA: u16 = 800;
const CALYREX: u16 = 898;

/// Box legendaries. Sub-legendaries are deliberately absent.
const LEGENDARY: &[u16] = &[
    MEWTWO, 249, 250, // Lugia, Ho-Oh
    382, 383, 384, // Kyogre, Groudon, Rayquaza
    483, 484, 487, // Dialga, Palkia, Giratina
    643, 644, KYUREM, // Reshiram, Zekrom
    716, 717, 718, // Xerneas, Yveltal, Zygarde
    789, 790, 791, 792, NECROZMA, // Cosmog line, Necrozma
    888, 889, 890, CALYREX, // Zacian, Zamazenta, Eternatus
    1007, 1008, 1024, // Koraidon, Miraidon, Terapagos
];

const MYTHICAL: &[u16] = &[
    151, 251, 385, 386, // Mew, Celebi, Jirachi, Deoxys
    489, 490, 491, 492, 493, // Phione, Manaphy, Darkrai, Shaymin, Arceus
    494, 647, 648, 649, // Victini, Keldeo, Meloetta, Genesect
    719, 720, 721, // Diancie, Hoopa, Volcanion
    801, 802, 807, 808, 809, // Magearna, Marshadow, Zeraora, Meltan, Melmetal
    893, 1025, // Zarude, Pecharunt
];

pub fn is_legendary(species: u16) -> bool {
    LEGENDARY.contains(&species)
}

pub fn is_mythical(species: u16) -> bool {
    MYTHICAL.contains(&species)
}

/// Forms produced by fusing two creatures, which cannot be surprise traded.
pub fn is_fused_form(species: u16, form: u8, generation: u8) -> bool {
    match species {
        KYUREM => form != 0 && generation >= 5,
        NECROZMA => matches!(form, 1 | 2) && generation >= 7,
        CALYREX => form != 0 && generation >= 8,
        _ => false,
    }
}

/// Surprise trades ban legendaries, mythicals and fused forms.
pub fn disallow_random_recipient(species: u16, form: u8, generation: u8) -> bool {
    is_legendary(species) || is_mythical(species) || is_fused_form(species, form, generation)
}
