#![allow(dead_code)]

use ceph_nodecfg::core::keyring_store;
use ceph_nodecfg::error::Result;
use ceph_nodecfg::util::command::{CommandOutput, CommandRunner};
use std::cell::RefCell;
use std::path::Path;

pub const KEY: &str = "AQD9u2FlAAAAABAAq3iPaDl0hX2Mxj9m6WMrzA==";

/// Records every argv. Behaves like the keyring tool for `ceph-authtool`
/// and exits with `exit_for(program)` for everything else.
pub struct Recorder {
    pub calls: RefCell<Vec<Vec<String>>>,
    pub failing: Vec<(String, i32)>,
    pub lsblk_json: String,
}

impl Recorder {
    pub fn new() -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
            failing: Vec::new(),
            lsblk_json: r#"{"blockdevices": []}"#.to_string(),
        }
    }

    pub fn fail(mut self, program: &str, code: i32) -> Self {
        self.failing.push((program.to_string(), code));
        self
    }

    pub fn programs(&self) -> Vec<String> {
        self.calls.borrow().iter().map(|c| c[0].clone()).collect()
    }

    fn authtool(&self, argv: &[String]) -> CommandOutput {
        let flag = |name: &str| {
            argv.iter()
                .position(|a| a == name)
                .and_then(|i| argv.get(i + 1))
                .cloned()
        };
        let (Some(principal), Some(path)) = (flag("-n"), flag("--create-keyring")) else {
            return CommandOutput { exit_code: 22, ..CommandOutput::default() };
        };
        let key = flag("--add-key").unwrap_or_else(|| KEY.to_string());
        let text = keyring_store::encode(&principal, &[("mon", "allow *")], Some(&key));
        match std::fs::write(Path::new(&path), text) {
            Ok(()) => CommandOutput::default(),
            Err(e) => CommandOutput {
                exit_code: 1,
                stdout: String::new(),
                stderr: e.to_string(),
            },
        }
    }
}

impl CommandRunner for Recorder {
    fn run(&self, argv: &[String]) -> Result<CommandOutput> {
        self.calls.borrow_mut().push(argv.to_vec());
        let program = argv[0].as_str();
        if let Some((_, code)) = self.failing.iter().find(|(p, _)| p == program) {
            return Ok(CommandOutput {
                exit_code: *code,
                stdout: String::new(),
                stderr: format!("{} failed", program),
            });
        }
        Ok(match program {
            "ceph-authtool" => self.authtool(argv),
            "lsblk" => CommandOutput {
                exit_code: 0,
                stdout: self.lsblk_json.clone(),
                stderr: String::new(),
            },
            _ => CommandOutput::default(),
        })
    }
}
