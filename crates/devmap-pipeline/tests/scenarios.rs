//! End-to-end runs over small device files.

use devmap_link::{ImageLayout, LinkError};
use devmap_pipeline::{load_device, process_device, process_files, DevmapConfig, PipelineError};

const SAMD21: &str = r#"{
    "name": "ATSAMD21G18A",
    "cpu": "cortex-m0plus",
    "address-spaces": [
        { "id": "base", "start": 0, "size": 4294967296, "regions": [
            { "name": "FLASH", "start": 0, "size": 262144, "kind": "flash", "page-size": 64 },
            { "name": "NVMCTRL_FLASH", "start": 0, "size": 262144, "kind": "flash" },
            { "name": "CAL", "start": 8388608, "size": 8, "kind": "fuses" },
            { "name": "HSRAM", "start": 536870912, "size": 32768, "kind": "ram" }
        ] }
    ],
    "peripherals": [
        {
            "name": "SERCOM", "id": "U2201",
            "register-groups": [
                { "name": "SERCOM", "size": 8, "modes": ["SPI", "I2C"], "members": [
                    { "type": "register", "name": "BAUD", "offset": 4, "size": 4, "mode": "SPI",
                      "fields": [ { "name": "BAUD", "mask": 255 } ] },
                    { "type": "register", "name": "ADDR", "offset": 4, "size": 4, "mode": "I2C",
                      "fields": [ { "name": "ADDR", "mask": 2046 } ] }
                ] }
            ],
            "instances": [
                { "name": "SERCOM0", "register-groups": [
                    { "instance-name": "SERCOM0", "module-name": "SERCOM", "address-space": "base", "offset": 1107297280 }
                ] }
            ]
        },
        {
            "name": "FUSES", "id": "U2401",
            "register-groups": [
                { "name": "USER_FUSES", "size": 32, "members": [
                    { "type": "register", "name": "WORD", "offset": 16, "size": 4, "count": 4 }
                ] }
            ],
            "instances": [
                { "name": "FUSES", "register-groups": [
                    { "instance-name": "USER_FUSES", "module-name": "USER_FUSES", "address-space": "base", "offset": 8388608 }
                ] }
            ]
        },
        { "name": "NVIC", "id": "" }
    ],
    "interrupts": [
        { "name": "Reset", "index": -15 },
        { "name": "HardFault", "index": -13 },
        { "name": "PM", "index": 0 },
        { "name": "SERCOM0", "index": 9 }
    ]
}"#;

const SAMA5: &str = r#"
name = "ATSAMA5D27"
cpu = "cortex-a5"

[[address-spaces]]
id = "base"
start = 0
size = 4294967296

[[address-spaces.regions]]
name = "IMEMORIES"
start = 0
size = 0x100000
kind = "ram"

[[address-spaces.regions]]
name = "SRAM0"
start = 0
size = 0x10000
kind = "ram"

[[address-spaces.regions]]
name = "DDR_CS"
start = 0x20000000
size = 0x10000000
kind = "ram"
"#;

fn samd21() -> devmap_core::DeviceDescription {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ATSAMD21G18A.json");
    std::fs::write(&path, SAMD21).unwrap();
    load_device(&path).unwrap()
}

fn sama5() -> devmap_core::DeviceDescription {
    devmap_pipeline::parse_device(SAMA5, devmap_pipeline::Format::Toml).unwrap()
}

/// Scenario A: identical regions collapse into one with an alias.
#[test]
fn identical_regions_become_aliases() {
    let out = process_device(&samd21(), &DevmapConfig::default()).unwrap();
    let flash = out.map.region("FLASH").unwrap();
    assert_eq!((flash.start, flash.size), (0, 0x4_0000));
    assert!(out.map.aliases_of("FLASH").unwrap().contains("NVMCTRL_FLASH"));
    assert_eq!(out.map.region("NVMCTRL_FLASH").unwrap().name, "FLASH");
    assert_eq!(out.map.regions().filter(|r| r.start == 0).count(), 1);
    assert!(out
        .plan
        .region_aliases
        .iter()
        .any(|a| a.alias == "nvmctrl_flash" && a.region == "flash"));
}

/// Scenario B: an enclosing region wins over the one it contains.
#[test]
fn containment_keeps_the_enclosing_region() {
    let device = sama5();
    let config = DevmapConfig::from_toml("class = \"mcu\"\n").unwrap();
    let class = config.class_for(&device.cpu);
    let resolution =
        devmap_memmap::resolve(&device.name, &device.address_spaces, &config.resolver_config(class))
            .unwrap();
    assert!(resolution.map.region("IMEMORIES").is_some());
    assert!(resolution.map.region("SRAM0").is_none());
    assert!(resolution.diagnostics.is_empty());
}

/// Microprocessors drop the umbrella region and resolve SRAM without any configuration.
#[test]
fn mpu_resolves_sram_by_default() {
    let out = process_device(&sama5(), &DevmapConfig::default()).unwrap();
    assert_eq!(out.class, devmap_pipeline::DeviceClass::Mpu);
    assert!(out.map.region("IMEMORIES").is_none());
    assert!(out.map.region("SRAM0").is_some());
    assert!(out.diagnostics.is_empty(), "{:?}", out.diagnostics);
}

/// The whole image, data and stacks included, lives in DDR; SRAM holds relocated code.
#[test]
fn mpu_image_lives_in_ddr() {
    let out = process_device(&sama5(), &DevmapConfig::default()).unwrap();
    let plan = &out.plan;
    assert_eq!(plan.layout, ImageLayout::Loaded);
    assert_eq!(plan.flash.name, "DDR_CS");
    assert_eq!(plan.ram.name, "DDR_CS");
    assert_eq!(plan.ramfunc.as_ref().unwrap().name, "SRAM0");

    assert_eq!(plan.section(".bss").unwrap().region, "ddr_cs");
    assert_eq!(plan.section(".data").unwrap().load_region, None);
    let ramfunc = plan.section(".ramfunc").unwrap();
    assert_eq!((ramfunc.region.as_str(), ramfunc.load_region.as_deref()), ("sram0", Some("ddr_cs")));
    assert_eq!(plan.copy.run_region, "sram0");
    assert_eq!(plan.copy.sections, vec![".vectors", ".ramfunc"]);

    assert_eq!(plan.symbol("__IRQ_STACK_SIZE"), Some(512));
    assert_eq!(plan.reservations.block("und-stack").unwrap().end(), 0x3000_0000);
    assert!(plan.reservations.blocks.iter().all(|b| b.start >= 0x2000_0000));
}

/// Scenario C: mode-tagged registers at the same offset form a union.
#[test]
fn mode_registers_form_union_variants() {
    let out = process_device(&samd21(), &DevmapConfig::default()).unwrap();
    let sercom = out.layouts_of("SERCOM").unwrap();
    assert!(sercom.is_ok());
    let layout = sercom.layout("SERCOM").unwrap();
    assert!(layout.is_union());
    assert_eq!(layout.size, 8);
    for mode in ["SPI", "I2C"] {
        let v = layout.variant(Some(mode)).unwrap();
        assert_eq!(v.members.len(), 1);
        assert_eq!(v.members[0].offset, 4);
        assert_eq!(v.members[0].padding_before, 4);
        assert_eq!(v.members[0].element_size, 4);
        assert_eq!(v.size, 8);
    }
    let addr = &layout.variant(Some("I2C")).unwrap().members[0];
    let devmap_regs::SlotKind::Register { fields, .. } = &addr.kind else {
        panic!("ADDR should be a register slot");
    };
    assert_eq!((fields[0].position, fields[0].width), (1, 10));
}

/// Scenario D: each fuse array element gets its own fixed region.
#[test]
fn fuse_array_elements_are_fixed_regions() {
    let out = process_device(&samd21(), &DevmapConfig::default()).unwrap();
    let starts: Vec<u64> = out.plan.fuses.iter().map(|f| f.start).collect();
    assert_eq!(starts, vec![0x0080_0010, 0x0080_0014, 0x0080_0018, 0x0080_001C]);
    assert!(out.plan.fuses.iter().all(|f| f.size == 4));
    for pair in out.plan.fuses.windows(2) {
        assert!(pair[0].end() <= pair[1].start);
    }
    for fuse in &out.plan.fuses {
        for region in [&out.plan.flash, &out.plan.ram] {
            assert!(!region.overlaps(fuse.start, fuse.size));
        }
    }
    assert!(out.diagnostics.is_empty(), "{:?}", out.diagnostics);
}

/// Scenario E: the default reservations fit; an oversized heap does not.
#[test]
fn reservations_fit_or_fail() {
    let out = process_device(&samd21(), &DevmapConfig::default()).unwrap();
    let r = &out.plan.reservations;
    assert_eq!(r.total(), 0x1000);
    assert!(r.blocks.iter().all(|b| b.start >= 0x2000_0000 && b.end() <= 0x2000_8000));

    let config = DevmapConfig::from_toml("[reservations]\nheap-size = 0x8000\n").unwrap();
    let err = process_device(&samd21(), &config).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Link(LinkError::LayoutOverflow { .. })
    ));
}

#[test]
fn vectors_and_bases_come_along() {
    let out = process_device(&samd21(), &DevmapConfig::default()).unwrap();
    assert_eq!(out.vectors.len(), 1 + 25);
    assert_eq!(out.vectors.handlers().count(), 4);
    assert_eq!(out.peripheral_bases.len(), 1);
    assert_eq!(out.peripheral_bases[0].address, 0x4200_0000);
}

#[test]
fn batch_over_files_keeps_order() {
    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("a.json");
    let b = dir.path().join("b.toml");
    std::fs::write(&a, SAMD21).unwrap();
    std::fs::write(&b, SAMA5).unwrap();

    let config = DevmapConfig::from_toml("[batch]\njobs = 2\n").unwrap();
    let items = process_files(&[a, b], &config);
    assert_eq!(items[0].name, "ATSAMD21G18A");
    assert_eq!(items[1].name, "ATSAMA5D27");
    assert!(items.iter().all(|i| i.result.is_ok()));
}
