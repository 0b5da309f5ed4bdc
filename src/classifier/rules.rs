//! Architecture Rule Table
//!
//! One ordered table of `{priority, pattern, record}` entries. Patterns run
//! against the normalized (lowercased, trademark-free) brand string and the
//! entry with the LOWEST priority number that matches wins.
//!
//! ## Priority bands
//!
//! | Band      | Family                                   |
//! |-----------|------------------------------------------|
//! | 100-199   | Apple Silicon                            |
//! | 200-299   | PowerPC, AmigaOne/Pegasos, IBM POWER     |
//! | 300-399   | RISC workstations, Motorola 68k          |
//! | 400-499   | Oddball x86 (Cyrix, VIA, Transmeta, IDT) |
//! | 500-599   | Vintage Intel (386 through Core 2)       |
//! | 600-699   | Intel Core i / versioned Xeon            |
//! | 700-799   | Intel unversioned Xeon, Xeon Scalable    |
//! | 800-899   | AMD                                      |
//! | 9000+     | Generic vendor fallbacks                 |
//!
//! Within a band, a rule that is a specialization of a broader rule MUST carry
//! the lower number. Each entry also carries a `sample` brand string; the test
//! suite asserts every sample resolves to its own entry, so an edit that
//! shadows an existing rule fails immediately.

use super::{ArchRecord, Isa, VectorFamily, Vendor};

/// One row of the rule table.
#[derive(Debug, Clone, Copy)]
pub struct ArchRule {
    /// Unique precedence; lower wins.
    pub priority: u32,
    /// Regex applied to the normalized brand string.
    pub pattern: &'static str,
    /// A representative brand string this rule must win for.
    pub sample: &'static str,
    pub record: &'static ArchRecord,
}

const fn rule(
    priority: u32,
    pattern: &'static str,
    sample: &'static str,
    record: &'static ArchRecord,
) -> ArchRule {
    ArchRule {
        priority,
        pattern,
        sample,
        record,
    }
}

const fn arch(
    vendor: Vendor,
    architecture: &'static str,
    generation: &'static str,
    release_year: i32,
    base_multiplier: f64,
    isa: Isa,
    vector: Option<VectorFamily>,
) -> ArchRecord {
    ArchRecord {
        vendor,
        architecture,
        generation,
        release_year,
        base_multiplier,
        isa,
        vector,
    }
}

use Isa::{Alpha, Arm, M68k, Mips, PaRisc, PowerPc, Sparc, X86};
use VectorFamily::{AltiVec, Neon, Scalar, SseAvx};

// ============================================================================
// Records
// ============================================================================

// Apple Silicon
static APPLE_M1: ArchRecord = arch(Vendor::Apple, "m1", "Apple M1", 2020, 1.2, Arm, Some(Neon));
static APPLE_M2: ArchRecord = arch(Vendor::Apple, "m2", "Apple M2", 2022, 1.15, Arm, Some(Neon));
static APPLE_M3: ArchRecord = arch(Vendor::Apple, "m3", "Apple M3", 2023, 1.1, Arm, Some(Neon));
static APPLE_M4: ArchRecord = arch(Vendor::Apple, "m4", "Apple M4", 2024, 1.05, Arm, Some(Neon));

// PowerPC
static PPC_G3: ArchRecord = arch(Vendor::PowerPc, "g3", "PowerPC G3 (750)", 1997, 1.8, PowerPc, Some(Scalar));
static PPC_G4: ArchRecord = arch(Vendor::PowerPc, "g4", "PowerPC G4 (7450/7447/7455)", 2001, 2.5, PowerPc, Some(AltiVec));
static PPC_G5: ArchRecord = arch(Vendor::PowerPc, "g5", "PowerPC G5 (970)", 2003, 2.0, PowerPc, Some(AltiVec));
static AMIGAONE_G3: ArchRecord = arch(Vendor::PowerPc, "amigaone_g3", "AmigaOne G3", 2002, 2.4, PowerPc, Some(Scalar));
static AMIGAONE_G4: ArchRecord = arch(Vendor::PowerPc, "amigaone_g4", "AmigaOne G4", 2003, 2.3, PowerPc, Some(AltiVec));
static PEGASOS_G3: ArchRecord = arch(Vendor::PowerPc, "pegasos_g3", "Pegasos I (G3)", 2002, 2.3, PowerPc, Some(Scalar));
static PEGASOS_G4: ArchRecord = arch(Vendor::PowerPc, "pegasos_g4", "Pegasos II (G4)", 2004, 2.2, PowerPc, Some(AltiVec));
static SAM440: ArchRecord = arch(Vendor::PowerPc, "sam440", "Sam440 (PPC440EP)", 2007, 2.0, PowerPc, Some(Scalar));
static SAM460: ArchRecord = arch(Vendor::PowerPc, "sam460", "Sam460 (PPC460EX)", 2010, 1.9, PowerPc, Some(Scalar));

// IBM POWER
static POWER1: ArchRecord = arch(Vendor::Ibm, "power1", "IBM POWER1 (RIOS)", 1990, 2.8, PowerPc, None);
static POWER2: ArchRecord = arch(Vendor::Ibm, "power2", "IBM POWER2", 1993, 2.6, PowerPc, None);
static POWER3: ArchRecord = arch(Vendor::Ibm, "power3", "IBM POWER3", 1998, 2.4, PowerPc, None);
static POWER4: ArchRecord = arch(Vendor::Ibm, "power4", "IBM POWER4", 2001, 2.2, PowerPc, None);
static POWER5: ArchRecord = arch(Vendor::Ibm, "power5", "IBM POWER5", 2004, 2.0, PowerPc, None);
static POWER6: ArchRecord = arch(Vendor::Ibm, "power6", "IBM POWER6", 2007, 1.9, PowerPc, Some(AltiVec));
static POWER7: ArchRecord = arch(Vendor::Ibm, "power7", "IBM POWER7", 2010, 1.8, PowerPc, Some(AltiVec));

// RISC workstations
static SPARC_V7: ArchRecord = arch(Vendor::Sun, "sparc_v7", "SPARC v7", 1987, 2.9, Sparc, Some(Scalar));
static SPARC_V8: ArchRecord = arch(Vendor::Sun, "sparc_v8", "SPARC v8 (microSPARC/SuperSPARC)", 1990, 2.6, Sparc, Some(Scalar));
static SPARC_V9: ArchRecord = arch(Vendor::Sun, "sparc_v9", "UltraSPARC (v9)", 1995, 2.3, Sparc, None);
static SPARC_T1: ArchRecord = arch(Vendor::Sun, "sparc_t1", "UltraSPARC T1 (Niagara)", 2005, 1.9, Sparc, None);
static SPARC_T2: ArchRecord = arch(Vendor::Sun, "sparc_t2", "UltraSPARC T2 (Niagara 2)", 2007, 1.8, Sparc, None);
static MIPS_R2000: ArchRecord = arch(Vendor::Mips, "mips_r2000", "MIPS R2000", 1985, 3.0, Mips, Some(Scalar));
static MIPS_R3000: ArchRecord = arch(Vendor::Mips, "mips_r3000", "MIPS R3000", 1988, 2.8, Mips, Some(Scalar));
static MIPS_R4000: ArchRecord = arch(Vendor::Mips, "mips_r4000", "MIPS R4000/R4400", 1991, 2.6, Mips, Some(Scalar));
static MIPS_R5000: ArchRecord = arch(Vendor::Mips, "mips_r5000", "MIPS R5000", 1996, 2.3, Mips, Some(Scalar));
static MIPS_R10000: ArchRecord = arch(Vendor::Mips, "mips_r10000", "MIPS R10000 family", 1996, 2.4, Mips, Some(Scalar));
static ALPHA_21064: ArchRecord = arch(Vendor::Dec, "alpha_21064", "DEC Alpha 21064 (EV4)", 1992, 2.7, Alpha, Some(Scalar));
static ALPHA_21164: ArchRecord = arch(Vendor::Dec, "alpha_21164", "DEC Alpha 21164 (EV5)", 1995, 2.5, Alpha, Some(Scalar));
static ALPHA_21264: ArchRecord = arch(Vendor::Dec, "alpha_21264", "DEC Alpha 21264 (EV6)", 1998, 2.3, Alpha, Some(Scalar));
static PA_RISC_10: ArchRecord = arch(Vendor::Hp, "pa_risc_1_0", "HP PA-RISC 1.0", 1986, 2.9, PaRisc, Some(Scalar));
static PA_RISC_11: ArchRecord = arch(Vendor::Hp, "pa_risc_1_1", "HP PA-RISC 1.1", 1990, 2.6, PaRisc, Some(Scalar));
static PA_RISC_20: ArchRecord = arch(Vendor::Hp, "pa_risc_2_0", "HP PA-RISC 2.0", 1996, 2.3, PaRisc, Some(Scalar));

// Motorola 68k
static M68000: ArchRecord = arch(Vendor::Motorola, "m68000", "Motorola 68000", 1979, 3.0, M68k, Some(Scalar));
static M68010: ArchRecord = arch(Vendor::Motorola, "m68010", "Motorola 68010", 1982, 2.9, M68k, Some(Scalar));
static M68020: ArchRecord = arch(Vendor::Motorola, "m68020", "Motorola 68020", 1984, 2.8, M68k, Some(Scalar));
static M68030: ArchRecord = arch(Vendor::Motorola, "m68030", "Motorola 68030", 1987, 2.6, M68k, Some(Scalar));
static M68040: ArchRecord = arch(Vendor::Motorola, "m68040", "Motorola 68040", 1990, 2.4, M68k, Some(Scalar));
static M68060: ArchRecord = arch(Vendor::Motorola, "m68060", "Motorola 68060", 1994, 2.2, M68k, Some(Scalar));

// Oddball x86
static CYRIX_6X86: ArchRecord = arch(Vendor::Cyrix, "cyrix_6x86", "Cyrix 6x86/MII/MediaGX", 1995, 2.5, X86, Some(Scalar));
static VIA_C3: ArchRecord = arch(Vendor::Via, "via_c3", "VIA C3", 2001, 1.9, X86, None);
static VIA_C7: ArchRecord = arch(Vendor::Via, "via_c7", "VIA C7", 2005, 1.8, X86, None);
static VIA_NANO: ArchRecord = arch(Vendor::Via, "via_nano", "VIA Nano", 2008, 1.7, X86, None);
static CRUSOE: ArchRecord = arch(Vendor::Transmeta, "transmeta_crusoe", "Transmeta Crusoe", 2000, 2.1, X86, None);
static EFFICEON: ArchRecord = arch(Vendor::Transmeta, "transmeta_efficeon", "Transmeta Efficeon", 2004, 2.0, X86, None);
static WINCHIP: ArchRecord = arch(Vendor::Idt, "winchip", "IDT/Centaur WinChip", 1997, 2.3, X86, Some(Scalar));

// Vintage Intel
static I386: ArchRecord = arch(Vendor::Intel, "i386", "Intel 80386", 1985, 3.0, X86, Some(Scalar));
static I486: ArchRecord = arch(Vendor::Intel, "i486", "Intel 80486", 1989, 2.8, X86, Some(Scalar));
static PENTIUM_P5: ArchRecord = arch(Vendor::Intel, "pentium_p5", "Intel Pentium P5/MMX", 1993, 2.6, X86, Some(Scalar));
static PENTIUM_PRO: ArchRecord = arch(Vendor::Intel, "pentium_pro", "Intel Pentium Pro (P6)", 1995, 2.4, X86, Some(Scalar));
static PENTIUM_II: ArchRecord = arch(Vendor::Intel, "pentium_ii", "Intel Pentium II", 1997, 2.2, X86, Some(Scalar));
static PENTIUM_III: ArchRecord = arch(Vendor::Intel, "pentium_iii", "Intel Pentium III", 1999, 2.0, X86, Some(SseAvx));
static PENTIUM_4: ArchRecord = arch(Vendor::Intel, "pentium4", "Intel Pentium 4 (NetBurst)", 2000, 1.5, X86, Some(SseAvx));
static PENTIUM_D: ArchRecord = arch(Vendor::Intel, "pentium_d", "Intel Pentium D", 2005, 1.5, X86, Some(SseAvx));
static CORE2: ArchRecord = arch(Vendor::Intel, "core2", "Intel Core 2", 2006, 1.3, X86, Some(SseAvx));

// Intel Core i / Xeon
static NEHALEM: ArchRecord = arch(Vendor::Intel, "nehalem", "Intel Nehalem (1st-gen Core i)", 2008, 1.2, X86, Some(SseAvx));
static WESTMERE: ArchRecord = arch(Vendor::Intel, "westmere", "Intel Westmere", 2010, 1.2, X86, Some(SseAvx));
static SANDY_BRIDGE: ArchRecord = arch(Vendor::Intel, "sandy_bridge", "Intel Sandy Bridge (2nd-gen Core i)", 2011, 1.1, X86, Some(SseAvx));
static IVY_BRIDGE: ArchRecord = arch(Vendor::Intel, "ivy_bridge", "Intel Ivy Bridge (3rd-gen Core i)", 2012, 1.1, X86, Some(SseAvx));
static HASWELL: ArchRecord = arch(Vendor::Intel, "haswell", "Intel Haswell (4th-gen Core i)", 2013, 1.1, X86, Some(SseAvx));
static BROADWELL: ArchRecord = arch(Vendor::Intel, "broadwell", "Intel Broadwell (5th-gen Core i)", 2014, 1.05, X86, Some(SseAvx));
static SKYLAKE: ArchRecord = arch(Vendor::Intel, "skylake", "Intel Skylake (6th-gen Core i)", 2015, 1.05, X86, Some(SseAvx));
static KABY_LAKE: ArchRecord = arch(Vendor::Intel, "kaby_lake", "Intel Kaby Lake (7th-gen Core i)", 2016, 1.0, X86, Some(SseAvx));
static COFFEE_LAKE: ArchRecord = arch(Vendor::Intel, "coffee_lake", "Intel Coffee Lake (8th/9th-gen Core i)", 2017, 1.0, X86, Some(SseAvx));
static CASCADE_LAKE: ArchRecord = arch(Vendor::Intel, "cascade_lake", "Intel Cascade Lake (Xeon Scalable 2nd-gen)", 2019, 1.0, X86, Some(SseAvx));
static COMET_LAKE: ArchRecord = arch(Vendor::Intel, "comet_lake", "Intel Comet Lake (10th-gen Core i)", 2020, 1.0, X86, Some(SseAvx));
static ICE_LAKE_SP: ArchRecord = arch(Vendor::Intel, "ice_lake_sp", "Intel Ice Lake (Xeon Scalable 3rd-gen)", 2021, 1.0, X86, Some(SseAvx));
static ROCKET_LAKE: ArchRecord = arch(Vendor::Intel, "rocket_lake", "Intel Rocket Lake (11th-gen Core i)", 2021, 1.0, X86, Some(SseAvx));
static ALDER_LAKE: ArchRecord = arch(Vendor::Intel, "alder_lake", "Intel Alder Lake (12th-gen Core i)", 2021, 1.0, X86, Some(SseAvx));
static RAPTOR_LAKE: ArchRecord = arch(Vendor::Intel, "raptor_lake", "Intel Raptor Lake (13th/14th-gen Core i)", 2022, 1.0, X86, Some(SseAvx));
static SAPPHIRE_RAPIDS: ArchRecord = arch(Vendor::Intel, "sapphire_rapids", "Intel Sapphire Rapids (Xeon Scalable 4th-gen)", 2023, 1.0, X86, Some(SseAvx));
static EMERALD_RAPIDS: ArchRecord = arch(Vendor::Intel, "emerald_rapids", "Intel Emerald Rapids (Xeon Scalable 5th-gen)", 2023, 1.0, X86, Some(SseAvx));
static METEOR_LAKE: ArchRecord = arch(Vendor::Intel, "meteor_lake", "Intel Meteor Lake (Core Ultra 1xx)", 2023, 1.0, X86, Some(SseAvx));
static ARROW_LAKE: ArchRecord = arch(Vendor::Intel, "arrow_lake", "Intel Arrow Lake (Core Ultra 2xx)", 2024, 1.0, X86, Some(SseAvx));

// AMD
static AMD_K5: ArchRecord = arch(Vendor::Amd, "k5", "AMD K5", 1996, 2.4, X86, Some(Scalar));
static AMD_K6: ArchRecord = arch(Vendor::Amd, "k6", "AMD K6/K6-2/K6-III", 1997, 2.2, X86, Some(Scalar));
static AMD_K7: ArchRecord = arch(Vendor::Amd, "k7_athlon", "AMD K7 (Athlon/Duron)", 1999, 1.5, X86, None);
static AMD_K8: ArchRecord = arch(Vendor::Amd, "k8_athlon64", "AMD K8 (Athlon 64/Opteron)", 2003, 1.5, X86, Some(SseAvx));
static AMD_K10: ArchRecord = arch(Vendor::Amd, "k10_phenom", "AMD K10 (Phenom/Athlon II)", 2007, 1.4, X86, Some(SseAvx));
static BULLDOZER: ArchRecord = arch(Vendor::Amd, "bulldozer", "AMD Bulldozer (FX 1st-gen)", 2011, 1.3, X86, Some(SseAvx));
static PILEDRIVER: ArchRecord = arch(Vendor::Amd, "piledriver", "AMD Piledriver (FX 2nd-gen)", 2012, 1.3, X86, Some(SseAvx));
static STEAMROLLER: ArchRecord = arch(Vendor::Amd, "steamroller", "AMD Steamroller (APU)", 2014, 1.2, X86, Some(SseAvx));
static EXCAVATOR: ArchRecord = arch(Vendor::Amd, "excavator", "AMD Excavator (APU)", 2015, 1.2, X86, Some(SseAvx));
static ZEN: ArchRecord = arch(Vendor::Amd, "zen", "AMD Zen (Ryzen 1000 / EPYC Naples)", 2017, 1.1, X86, Some(SseAvx));
static ZEN_PLUS: ArchRecord = arch(Vendor::Amd, "zen_plus", "AMD Zen+ (Ryzen 2000)", 2018, 1.1, X86, Some(SseAvx));
static ZEN2: ArchRecord = arch(Vendor::Amd, "zen2", "AMD Zen 2 (Ryzen 3000/4000 / EPYC Rome)", 2019, 1.05, X86, Some(SseAvx));
static ZEN3: ArchRecord = arch(Vendor::Amd, "zen3", "AMD Zen 3 (Ryzen 5000 / EPYC Milan)", 2020, 1.0, X86, Some(SseAvx));
static ZEN4: ArchRecord = arch(Vendor::Amd, "zen4", "AMD Zen 4 (Ryzen 7000/8000 / EPYC Genoa)", 2022, 1.0, X86, Some(SseAvx));
static ZEN5: ArchRecord = arch(Vendor::Amd, "zen5", "AMD Zen 5 (Ryzen 9000 / EPYC Turin)", 2024, 1.0, X86, Some(SseAvx));

// Fallbacks
static MODERN_INTEL: ArchRecord = arch(Vendor::Intel, "modern_intel", "Modern Intel CPU (generic)", 2020, 1.0, X86, None);
static MODERN_AMD: ArchRecord = arch(Vendor::Amd, "modern_amd", "Modern AMD CPU (generic)", 2020, 1.0, X86, None);

// ============================================================================
// Table
// ============================================================================

/// The default rule table. Kept in ascending priority order for readability;
/// the classifier sorts it again at build time regardless.
pub static DEFAULT_RULES: &[ArchRule] = &[
    // Apple Silicon
    rule(100, r"\bapple m1\b", "Apple M1 Pro", &APPLE_M1),
    rule(110, r"\bapple m2\b", "Apple M2", &APPLE_M2),
    rule(120, r"\bapple m3\b", "Apple M3 Max", &APPLE_M3),
    rule(130, r"\bapple m4\b", "Apple M4", &APPLE_M4),
    // AmigaOne / Pegasos before the bare G3/G4 lines
    rule(200, r"\bamigaone\b.*\b(g4|74[45]\d)\b", "AmigaOne XE G4", &AMIGAONE_G4),
    rule(201, r"\bamigaone\b.*\b(g3|750)\b", "AmigaOne SE G3", &AMIGAONE_G3),
    rule(202, r"\bpegasos( ii\b|\b.*\bg4\b)", "Pegasos II G4", &PEGASOS_G4),
    rule(203, r"\bpegasos( i\b|\b.*\bg3\b)", "Pegasos I G3", &PEGASOS_G3),
    rule(204, r"\bsam440|\b(ppc)?440ep\b", "Sam440ep", &SAM440),
    rule(205, r"\bsam460|\b(ppc)?460ex\b", "Sam460ex", &SAM460),
    // PowerPC
    rule(210, r"\bpowerpc g4\b|\bmpc74[0-5]\d|^74[0-5]\d[a-z]?\b|\(74[0-5]\d[a-z]?\)", "PowerPC G4 (7450)", &PPC_G4),
    rule(211, r"\bpowerpc g5\b|\bppc970|^970(fx|mp|gx)?\b|\(970(fx|mp|gx)?\)", "PowerPC G5 (970)", &PPC_G5),
    rule(212, r"\bpowerpc g3\b|^7[45]0[a-z]*\b|\(750[a-z]*\)", "750CXe, altivec not supported", &PPC_G3),
    // IBM POWER
    rule(220, r"\bpower1\b|\brios\b", "IBM POWER1", &POWER1),
    rule(221, r"\bpower2\b|\bp2sc\b", "IBM POWER2 P2SC", &POWER2),
    rule(222, r"\bpower3\b", "POWER3 (630)", &POWER3),
    rule(223, r"\bpower4\b", "POWER4+ (gq)", &POWER4),
    rule(224, r"\bpower5\b", "POWER5+ (gs)", &POWER5),
    rule(225, r"\bpower6\b", "POWER6 (raw)", &POWER6),
    rule(226, r"\bpower7\b", "POWER7 (architected)", &POWER7),
    // SPARC: T-series before the generic UltraSPARC line
    rule(300, r"\bultrasparc t2\b|\bniagara 2\b", "UltraSPARC T2 (Niagara 2)", &SPARC_T2),
    rule(301, r"\bultrasparc t1\b|\bniagara\b", "UltraSPARC T1", &SPARC_T1),
    rule(302, r"\bsparc v9\b|\bultrasparc\b", "Sun UltraSPARC IIi", &SPARC_V9),
    rule(303, r"\bsparc v8\b|\b(micro|super|hyper)sparc\b", "TI SuperSPARC", &SPARC_V8),
    rule(304, r"\bsparc v7\b|\bmb86900\b|\b7c601\b", "Cypress 7C601", &SPARC_V7),
    // MIPS
    rule(310, r"\br1[0246]000[a-z]*\b", "MIPS R10000 V2.6", &MIPS_R10000),
    rule(311, r"\br5000[a-z]*\b|\brm(5200|7000)\b", "MIPS R5000 V2.1", &MIPS_R5000),
    rule(312, r"\br4[04]00[a-z]*\b", "MIPS R4400SC", &MIPS_R4000),
    rule(313, r"\br3000[a-z]*\b", "MIPS R3000A", &MIPS_R3000),
    rule(314, r"\br2000[a-z]*\b", "MIPS R2000", &MIPS_R2000),
    // DEC Alpha
    rule(320, r"\balpha 21264\b|\bdecchip 21264\b|\bev6[78]?\b", "EV67", &ALPHA_21264),
    rule(321, r"\balpha 21164\b|\bdecchip 21164\b|\bev5[6]?\b", "EV56", &ALPHA_21164),
    rule(322, r"\balpha 21064\b|\bdecchip 21064\b|\bev4[5]?\b", "DECchip 21064", &ALPHA_21064),
    // PA-RISC
    rule(330, r"\bpa-risc 2\.0\b|\bpa8[0-9]00[a-z]*\b", "PA8500 (PCX-W)", &PA_RISC_20),
    rule(331, r"\bpa-risc 1\.1\b|\bpa7[12]00[a-z]*\b", "PA7100LC", &PA_RISC_11),
    rule(332, r"\bpa-risc 1\.0\b|\bpa7000\b", "PA-RISC 1.0", &PA_RISC_10),
    // Motorola 68k
    rule(340, r"\b(mc|m)?68(lc)?060\b", "MC68060", &M68060),
    rule(341, r"\b(mc|m)?68(lc)?040\b", "Motorola 68LC040", &M68040),
    rule(342, r"\b(mc|m)?68030\b", "Motorola 68030", &M68030),
    rule(343, r"\b(mc|m)?68020\b", "MC68020", &M68020),
    rule(344, r"\b(mc|m)?68010\b", "m68010", &M68010),
    rule(345, r"\b(mc|m)?68000\b", "Motorola 68000", &M68000),
    // Oddball x86
    rule(400, r"\bcyrix\b|\b6x86(mx)?\b|\bmediagx\b", "Cyrix 6x86MX", &CYRIX_6X86),
    rule(410, r"\bvia nano\b|\bisaiah\b", "VIA Nano U2250", &VIA_NANO),
    rule(411, r"\bvia c7\b|\besther\b", "VIA C7-M", &VIA_C7),
    rule(412, r"\bvia c3\b|\bsamuel\b|\bezra\b", "VIA C3 Nehemiah", &VIA_C3),
    rule(420, r"\befficeon\b|\btm8[0-9]00\b", "Transmeta Efficeon TM8600", &EFFICEON),
    rule(421, r"\bcrusoe\b|\btm5[0-9]00\b", "Transmeta Crusoe TM5800", &CRUSOE),
    rule(430, r"\bwinchip\b", "IDT WinChip C6", &WINCHIP),
    // Vintage Intel
    rule(500, r"\b(i|80)386[a-z]*\b|\bintel 386\b", "Intel 80386DX", &I386),
    rule(501, r"\b(i|80)486[a-z0-9]*\b|\b486(dx|sx)\d?\b", "Intel 486DX2", &I486),
    rule(502, r"\bpentium pro\b|\bppro\b", "Intel Pentium Pro", &PENTIUM_PRO),
    rule(503, r"\bpentium iii\b|\bpiii\b", "Intel(R) Pentium(R) III CPU 1133MHz", &PENTIUM_III),
    rule(504, r"\bpentium ii\b", "Intel Pentium II 400MHz", &PENTIUM_II),
    rule(505, r"\bpentium mmx\b|^intel pentium$|\bpentium (60|66|75|90|100|120|133|150|166|200|233)\b", "Intel Pentium MMX", &PENTIUM_P5),
    rule(506, r"\bpentium d\b", "Intel(R) Pentium(R) D CPU 3.40GHz", &PENTIUM_D),
    rule(507, r"\bpentium 4\b", "Intel(R) Pentium(R) 4 CPU 3.00GHz", &PENTIUM_4),
    rule(510, r"\bcore ?2\b|\bxeon [elx]5[34]\d{2}\b", "Intel(R) Core(TM)2 Duo CPU E8400 @ 3.00GHz", &CORE2),
    // Intel Core i. Westmere's 9x0 desktop parts overlap the Nehalem digit
    // range and must precede it.
    rule(600, r"\bcore i7[- ]9[789]0x?\b|\bcore i[35][- ][56]\d{2}[a-z]*\b|\bxeon [elwx]56\d{2}\b", "Intel(R) Core(TM) i7-980X CPU @ 3.33GHz", &WESTMERE),
    rule(601, r"\bcore i[357][- ][789]\d{2}[a-z]*\b|\bxeon [elwx]55\d{2}\b", "Intel(R) Core(TM) i7 CPU 920 @ 2.67GHz", &NEHALEM),
    rule(610, r"\bcore i[3579][- ]2\d{3}[a-z]*\b", "Intel(R) Core(TM) i7-2600K CPU @ 3.40GHz", &SANDY_BRIDGE),
    rule(611, r"\bcore i[3579][- ]3\d{3}[a-z]*\b", "Intel(R) Core(TM) i7-3770K CPU @ 3.50GHz", &IVY_BRIDGE),
    rule(612, r"\bcore i[3579][- ]4\d{3}[a-z]*\b", "Intel(R) Core(TM) i7-4770K CPU @ 3.50GHz", &HASWELL),
    rule(613, r"\bcore i[3579][- ]5\d{3}[a-z]*\b", "Intel(R) Core(TM) i7-5775C CPU @ 3.30GHz", &BROADWELL),
    rule(614, r"\bcore i[3579][- ]6\d{3}[a-z]*\b", "Intel(R) Core(TM) i7-6700K CPU @ 4.00GHz", &SKYLAKE),
    rule(615, r"\bcore i[3579][- ]7\d{3}[a-z]*\b", "Intel(R) Core(TM) i7-7700K CPU @ 4.20GHz", &KABY_LAKE),
    rule(616, r"\bcore i[3579][- ][89]\d{3}[a-z]*\b", "Intel(R) Core(TM) i9-9900K CPU @ 3.60GHz", &COFFEE_LAKE),
    rule(617, r"\bcore i[3579][- ]10\d{3}[a-z]*\b", "Intel(R) Core(TM) i7-10700K CPU @ 3.80GHz", &COMET_LAKE),
    rule(618, r"\bcore i[3579][- ]11\d{3}[a-z]*\b", "11th Gen Intel(R) Core(TM) i7-11700K @ 3.60GHz", &ROCKET_LAKE),
    rule(619, r"\bcore i[3579][- ]12\d{3}[a-z]*\b", "12th Gen Intel(R) Core(TM) i9-12900K", &ALDER_LAKE),
    rule(620, r"\bcore i[3579][- ]1[34]\d{3}[a-z]*\b|\bcore [3579] 1\d{2}[a-z]*\b", "13th Gen Intel(R) Core(TM) i9-13900K", &RAPTOR_LAKE),
    rule(621, r"\bcore ultra [579] 2\d{2}[a-z]*\b", "Intel(R) Core(TM) Ultra 9 285K", &ARROW_LAKE),
    rule(622, r"\bcore ultra [579] 1\d{2}[a-z]*\b", "Intel(R) Core(TM) Ultra 7 155H", &METEOR_LAKE),
    // Versioned Xeon E3/E5/E7 lines precede the unversioned (Sandy Bridge /
    // Westmere-EX) lines that would otherwise also match them.
    rule(650, r"\bxeon e3-12\d{2}l? v2\b|\bxeon e5-[124]\d{3}[lw]? v2\b|\bxeon e7-[248]8\d{2} v2\b", "Intel(R) Xeon(R) CPU E5-1650 v2 @ 3.50GHz", &IVY_BRIDGE),
    rule(651, r"\bxeon e3-12\d{2}l? v3\b|\bxeon e5-[124]\d{3}[lw]? v3\b|\bxeon e7-[248]8\d{2} v3\b", "Intel(R) Xeon(R) CPU E5-2680 v3 @ 2.50GHz", &HASWELL),
    rule(652, r"\bxeon e3-12\d{2}l? v4\b|\bxeon e5-[124]\d{3}[lw]? v4\b|\bxeon e7-[248]8\d{2} v4\b", "Intel(R) Xeon(R) CPU E5-2680 v4 @ 2.40GHz", &BROADWELL),
    rule(653, r"\bxeon e3-12\d{2}l? v5\b", "Intel(R) Xeon(R) CPU E3-1230 v5 @ 3.40GHz", &SKYLAKE),
    rule(654, r"\bxeon e3-12\d{2}l? v6\b", "Intel(R) Xeon(R) CPU E3-1270 v6 @ 3.80GHz", &KABY_LAKE),
    rule(700, r"\bxeon e3-12\d{2}l?\b|\bxeon e5-[124]\d{3}[lw]?\b", "Intel(R) Xeon(R) CPU E5-2670 0 @ 2.60GHz", &SANDY_BRIDGE),
    rule(701, r"\bxeon e7-[248]8\d{2}\b", "Intel(R) Xeon(R) CPU E7-8870 @ 2.40GHz", &WESTMERE),
    rule(710, r"\bxeon (bronze|silver|gold|platinum) \d1\d{2}[a-z]*\b", "Intel(R) Xeon(R) Gold 6148 CPU @ 2.40GHz", &SKYLAKE),
    rule(711, r"\bxeon (bronze|silver|gold|platinum) \d2\d{2}[a-z]*\b", "Intel(R) Xeon(R) Gold 6248R CPU @ 3.00GHz", &CASCADE_LAKE),
    rule(712, r"\bxeon (bronze|silver|gold|platinum) \d3\d{2}[a-z]*\b", "Intel(R) Xeon(R) Gold 6338 CPU @ 2.00GHz", &ICE_LAKE_SP),
    rule(713, r"\bxeon (bronze|silver|gold|platinum) \d4\d{2}[a-z]*\b", "Intel(R) Xeon(R) Platinum 8480+", &SAPPHIRE_RAPIDS),
    rule(714, r"\bxeon (bronze|silver|gold|platinum) \d5\d{2}[a-z]*\b", "Intel(R) Xeon(R) Platinum 8592+", &EMERALD_RAPIDS),
    // AMD. Zen-era Athlons precede the K7 line; K10/K8 precede K7 because
    // "athlon" alone is the K7 pattern.
    rule(800, r"\bamd-?k5\b|\bk5-pr\d{2,3}\b", "AMD-K5-PR133", &AMD_K5),
    rule(801, r"\bamd-?k6|\bk6-(2|iii)\b|\bk6/[23]\b", "AMD-K6(tm)-2 Processor", &AMD_K6),
    rule(810, r"\bathlon (silver |gold |pro )?\d{3,4}[a-z]+\b", "AMD Athlon 3000G with Radeon Vega Graphics", &ZEN_PLUS),
    rule(811, r"\bopteron (41|61)\d{2}[a-z]*\b", "AMD Opteron(tm) Processor 6174", &AMD_K10),
    rule(812, r"\bopteron (42|62)\d{2}[a-z]*\b", "AMD Opteron(tm) Processor 6276", &BULLDOZER),
    rule(813, r"\bopteron (43|63)\d{2}[a-z]*\b", "AMD Opteron(tm) Processor 6376", &PILEDRIVER),
    rule(814, r"\bphenom\b|\bathlon ii\b", "AMD Phenom(tm) II X6 1090T Processor", &AMD_K10),
    rule(815, r"\bathlon 64\b|\bopteron\b|\bturion 64\b", "AMD Athlon(tm) 64 X2 Dual Core Processor 4200+", &AMD_K8),
    rule(816, r"\bathlon\b|\bduron\b", "AMD Athlon(tm) XP 2500+", &AMD_K7),
    rule(820, r"\bfx-[468]1\d{2}[a-z]*\b", "AMD FX(tm)-8150 Eight-Core Processor", &BULLDOZER),
    rule(821, r"\bfx-([468]3\d{2}|9\d{3})[a-z]*\b", "AMD FX(tm)-8350 Eight-Core Processor", &PILEDRIVER),
    rule(822, r"\ba(4|6|8|10)-7\d{3}[a-z]*\b", "AMD A10-7850K Radeon R7", &STEAMROLLER),
    rule(823, r"\ba(6|8|9|10|12)-9\d{3}[a-z]*\b", "AMD A12-9800 RADEON R7", &EXCAVATOR),
    rule(830, r"\bryzen [3579] (pro )?1\d{3}[a-z]*\b|\bepyc 7\d{2}1[a-z]*\b", "AMD Ryzen 7 1700X Eight-Core Processor", &ZEN),
    rule(831, r"\bryzen [3579] (pro )?2\d{3}[a-z]*\b", "AMD Ryzen 7 2700X Eight-Core Processor", &ZEN_PLUS),
    rule(832, r"\bryzen [3579] (pro )?[34]\d{3}[a-z]*\b|\bepyc 7\d{2}2[a-z]*\b", "AMD EPYC 7742 64-Core Processor", &ZEN2),
    rule(833, r"\bryzen [3579] (pro )?5\d{3}[a-z0-9]*\b|\bepyc 7\d{2}3[a-z]*\b", "AMD Ryzen 9 5950X 16-Core Processor", &ZEN3),
    rule(834, r"\bryzen [3579] (pro )?[78]\d{3}[a-z0-9]*\b|\bepyc [89]\d{2}4[a-z]*\b", "AMD Ryzen 9 7950X 16-Core Processor", &ZEN4),
    rule(835, r"\bryzen [3579] (pro )?9\d{3}[a-z0-9]*\b|\bryzen ai\b|\bepyc 9\d{2}5[a-z]*\b", "AMD Ryzen 9 9950X 16-Core Processor", &ZEN5),
    // Generic fallbacks
    rule(9000, r"\bintel\b", "Intel(R) Pentium(R) Gold G5400 CPU @ 3.70GHz", &MODERN_INTEL),
    rule(9010, r"\bamd\b", "AMD Eng Sample: 100-000000", &MODERN_AMD),
];

/// Secondary server-family markers, applied independently of the matched line.
pub const SERVER_MARKERS: &str =
    r"\b(xeon|epyc|opteron|threadripper pro|power[1-9]|ultrasparc t[12]|niagara)\b";
