use std::path::Path;

use dynsched::{
    config::{ConfigError, ResourceConfig},
    inst::{InstError, Opcode},
    load,
    trace::Trace,
    Error,
};

#[test]
fn parse_all() {
    for entry in std::fs::read_dir("traces").unwrap() {
        let entry = entry.unwrap();
        let contents = std::fs::read_to_string(entry.path()).unwrap();
        let name = entry.file_name().to_str().unwrap().to_owned();

        println!("parsing {name}...");
        if name.ends_with(".txt") {
            contents
                .parse::<ResourceConfig>()
                .unwrap_or_else(|e| panic!("failed to parse config {name}: {e}"));
        } else {
            contents
                .parse::<Trace>()
                .unwrap_or_else(|e| panic!("failed to parse trace {name}: {e}"));
        }
    }
}

#[test]
fn check_basic_trace() {
    let trace = std::fs::read_to_string("traces/basic.dat")
        .unwrap()
        .parse::<Trace>()
        .expect("failed to parse traces/basic.dat");

    let opcodes = trace.insts.iter().map(|i| i.opcode).collect::<Vec<_>>();
    assert_eq!(
        opcodes,
        vec![
            Opcode::Flw,
            Opcode::Flw,
            Opcode::FmulS,
            Opcode::FsubS,
            Opcode::FdivS,
            Opcode::FaddS
        ]
    );
    assert_eq!(trace.insts[0].text, "flw    f6,32(x2):0x20");
}

#[test]
fn check_small_config() {
    let config = std::fs::read_to_string("traces/config_small.txt")
        .unwrap()
        .parse::<ResourceConfig>()
        .unwrap();

    assert_eq!(
        config,
        ResourceConfig {
            eff_addr: 1,
            fp_add: 1,
            fp_mul: 1,
            int: 1,
            reorder: 3,
            fp_add_latency: 3,
            fp_sub_latency: 3,
            fp_mul_latency: 6,
            fp_div_latency: 12,
        }
    );
}

#[test]
fn config_checked_before_trace() {
    let dir = std::env::temp_dir().join(format!("dynsched-parse-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();

    let bad_config = dir.join("config.txt");
    let bad_trace = dir.join("trace.dat");
    let config = std::fs::read_to_string("traces/config.txt").unwrap();
    std::fs::write(&bad_config, config.replace("reorder: 5", "reorder: 12")).unwrap();
    std::fs::write(&bad_trace, "add x1,x2,f3\n").unwrap();

    match load(&bad_config, &bad_trace) {
        Err(Error::Config(ConfigError::ReorderTooLarge(12))) => (),
        other => panic!("unexpected result: {other:?}"),
    }

    match load(Path::new("traces/config.txt"), &bad_trace) {
        Err(Error::Trace(e)) => {
            assert_eq!(e.line, 1);
            assert!(matches!(e.source, InstError::WrongRegClass { .. }));
        }
        other => panic!("unexpected result: {other:?}"),
    }

    match load(Path::new("traces/config.txt"), &dir.join("missing.dat")) {
        Err(Error::Io { path, .. }) => assert!(path.ends_with("missing.dat")),
        other => panic!("unexpected result: {other:?}"),
    }

    std::fs::remove_dir_all(&dir).unwrap();
}
