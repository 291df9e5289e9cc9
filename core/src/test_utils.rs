/// Test utilities and mock implementations for safe testing
use crate::{CommandOutput, CommandRunner, CommandSpec, EngineError};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn ok_output(stdout: &str) -> CommandOutput {
    CommandOutput {
        stdout: stdout.to_string(),
        stderr: String::new(),
        success: true,
    }
}

pub fn failed_output(stderr: &str) -> CommandOutput {
    CommandOutput {
        stdout: String::new(),
        stderr: stderr.to_string(),
        success: false,
    }
}

struct CannedResponse {
    pattern: String,
    output: CommandOutput,
    once: bool,
    used: bool,
}

/// Mock command runner - NEVER launches a real process.
///
/// Responses are matched in registration order against the rendered
/// command line; the first live match wins and `once` responses are
/// consumed. Unmatched commands succeed with empty output, which is the
/// same shape an empty PowerShell pipeline produces, so discovery paths
/// degrade exactly as they would against the real shell.
pub struct MockRunner {
    responses: Mutex<Vec<CannedResponse>>,
    calls: Arc<Mutex<Vec<String>>>,
    in_flight: Arc<Mutex<usize>>,
    max_in_flight: Arc<Mutex<usize>>,
    delay: Option<Duration>,
}

impl Default for MockRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRunner {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(Vec::new()),
            calls: Arc::new(Mutex::new(Vec::new())),
            in_flight: Arc::new(Mutex::new(0)),
            max_in_flight: Arc::new(Mutex::new(0)),
            delay: None,
        }
    }

    /// Respond to every command whose rendered line contains `pattern`.
    pub fn respond(self, pattern: &str, output: CommandOutput) -> Self {
        self.responses.lock().unwrap().push(CannedResponse {
            pattern: pattern.to_string(),
            output,
            once: false,
            used: false,
        });
        self
    }

    /// Like `respond`, but consumed by its first match. Registering the
    /// same pattern several times scripts successive calls.
    pub fn respond_once(self, pattern: &str, output: CommandOutput) -> Self {
        self.responses.lock().unwrap().push(CannedResponse {
            pattern: pattern.to_string(),
            output,
            once: true,
            used: false,
        });
        self
    }

    /// Hold every command open for `delay` so overlap is observable.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_matching(&self, pattern: &str) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| call.contains(pattern))
            .cloned()
            .collect()
    }

    /// High-water mark of concurrently running commands.
    pub fn max_in_flight(&self) -> usize {
        *self.max_in_flight.lock().unwrap()
    }

    fn lookup(&self, rendered: &str) -> CommandOutput {
        let mut responses = self.responses.lock().unwrap();
        for response in responses.iter_mut() {
            if response.used || !rendered.contains(&response.pattern) {
                continue;
            }
            if response.once {
                response.used = true;
            }
            return response.output.clone();
        }
        ok_output("")
    }
}

#[async_trait::async_trait]
impl CommandRunner for MockRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, EngineError> {
        let rendered = spec.rendered();
        self.calls.lock().unwrap().push(rendered.clone());
        {
            let mut in_flight = self.in_flight.lock().unwrap();
            *in_flight += 1;
            let mut max = self.max_in_flight.lock().unwrap();
            if *in_flight > *max {
                *max = *in_flight;
            }
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let output = self.lookup(&rendered);
        *self.in_flight.lock().unwrap() -= 1;
        Ok(output)
    }
}

/// Canned PowerShell JSON transcripts for discovery tests.
pub mod fixtures {
    /// Two USB sticks plus one internal NVMe disk; the NVMe entry must be
    /// filtered out of removable listings.
    pub const DISKS_MIXED: &str = r#"[
  {
    "Number": 1,
    "FriendlyName": "SanDisk Ultra USB Device",
    "Size": 15931539456,
    "PartitionStyle": "MBR",
    "OperationalStatus": "Online",
    "HealthStatus": "Healthy",
    "BusType": "USB",
    "IsOffline": false,
    "IsReadOnly": false
  },
  {
    "Number": 0,
    "FriendlyName": "Samsung SSD 980",
    "Size": 500107862016,
    "PartitionStyle": "GPT",
    "OperationalStatus": "Online",
    "HealthStatus": "Healthy",
    "BusType": "NVMe",
    "IsOffline": false,
    "IsReadOnly": false
  },
  {
    "Number": 2,
    "FriendlyName": "Generic SD Reader",
    "Size": 31914983424,
    "PartitionStyle": null,
    "OperationalStatus": "Online",
    "HealthStatus": "Healthy",
    "BusType": "USB",
    "IsOffline": false,
    "IsReadOnly": false
  }
]"#;

    /// Single disk rendered as a bare object, the shape ConvertTo-Json
    /// produces for one-element pipelines.
    pub const DISK_SINGLE_OBJECT: &str = r#"{
  "Number": 1,
  "FriendlyName": "SanDisk Ultra USB Device",
  "Size": 15931539456,
  "PartitionStyle": "MBR",
  "OperationalStatus": "Online",
  "HealthStatus": "Healthy",
  "BusType": "USB",
  "IsOffline": false,
  "IsReadOnly": false
}"#;

    /// Partition table of the SanDisk stick: one letterless reserved
    /// partition and one mounted basic partition.
    pub const PARTITIONS_DISK_1: &str = r#"[
  {
    "PartitionNumber": 1,
    "DriveLetter": null,
    "Size": 16777216,
    "Type": "Reserved",
    "IsActive": false
  },
  {
    "PartitionNumber": 2,
    "DriveLetter": "E",
    "Size": 15914762240,
    "Type": "Basic",
    "IsActive": true
  }
]"#;

    /// A single partition as a bare object.
    pub const PARTITION_SINGLE_OBJECT: &str = r#"{
  "PartitionNumber": 1,
  "DriveLetter": "F",
  "Size": 31914983424,
  "Type": "Basic",
  "IsActive": false
}"#;

    /// Removable logical drive as Win32_LogicalDisk reports it.
    pub const LOGICAL_REMOVABLE: &str = r#"{
  "DeviceID": "E:",
  "VolumeName": "SDCARD",
  "Size": 15914762240,
  "FreeSpace": 8057913344,
  "FileSystem": "FAT32",
  "DriveType": 2
}"#;

    /// Mounted drive names from Get-PSDrive.
    pub const PSDRIVE_NAMES: &str = r#"["C", "D", "E"]"#;
}
