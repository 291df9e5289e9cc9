use clap::{Parser, Subcommand};
use diskforge_core::{
    Device, DriveLetter, FormatRequest, LogicalDrive, Partition, PartitionStyle, PhysicalDisk,
};
use diskforge_engine::{DiskEngine, SafetyGuard, ShellRunner};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "diskforge")]
#[command(about = "Removable disk discovery and formatting tool", long_about = None)]
struct Cli {
    /// Additional protected drive letters; the system volume C is always protected
    #[arg(long, global = true, value_name = "LETTER")]
    protect: Vec<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List removable disks
    List,
    /// Show one disk in detail
    Info {
        /// Disk number
        disk: u32,
    },
    /// Show a mounted volume
    Volume {
        /// Drive letter (E or E:)
        letter: DriveLetter,
    },
    /// List a disk's partitions
    Partitions {
        /// Disk number
        disk: u32,
    },
    /// List drive letters free for assignment
    Letters,
    /// Format a volume by letter or rebuild a whole disk by number
    Format {
        /// Drive letter of the volume to format
        #[arg(short, long)]
        letter: Option<DriveLetter>,
        /// Disk number; forces a full disk rebuild
        #[arg(short, long)]
        disk: Option<u32>,
        /// Filesystem type (FAT32, exFAT, NTFS)
        #[arg(short, long, default_value = "FAT32")]
        filesystem: String,
        /// Volume label
        #[arg(long, default_value = "USB")]
        label: String,
        /// Full format instead of quick
        #[arg(long)]
        full: bool,
        /// Skip the confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },
    /// Clean, re-initialize and format a disk in one pass
    Rebuild {
        /// Disk number
        disk: u32,
        /// Filesystem type (FAT32, exFAT, NTFS)
        #[arg(short, long, default_value = "FAT32")]
        filesystem: String,
        /// Volume label
        #[arg(long, default_value = "USB")]
        label: String,
        /// Skip the confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },
    /// Wipe a disk's partition table
    Clean {
        /// Disk number
        disk: u32,
        /// Skip the confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },
    /// Write a partition table onto a RAW disk
    Init {
        /// Disk number
        disk: u32,
        /// Partition style (mbr or gpt)
        #[arg(long, default_value = "mbr")]
        style: String,
    },
    /// Bring a disk online
    Online {
        /// Disk number
        disk: u32,
    },
    /// Clear a disk's read-only flag
    ReadWrite {
        /// Disk number
        disk: u32,
    },
    /// Assign a drive letter to a partition
    Assign {
        /// Disk number
        disk: u32,
        /// Partition number
        partition: u32,
        /// Drive letter to assign
        letter: DriveLetter,
    },
    /// Remove a partition's drive letter
    Unassign {
        /// Disk number
        disk: u32,
        /// Partition number
        partition: u32,
    },
    /// Create and format a partition of the given size
    CreatePartition {
        /// Disk number
        disk: u32,
        /// Partition size in GB
        size_gb: f64,
        /// Filesystem type (FAT32, exFAT, NTFS)
        #[arg(short, long, default_value = "FAT32")]
        filesystem: String,
        /// Volume label
        #[arg(long, default_value = "USB")]
        label: String,
    },
    /// Delete a partition
    DeletePartition {
        /// Disk number
        disk: u32,
        /// Partition number
        partition: u32,
        /// Skip the confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let guard = SafetyGuard::new(std::iter::once("C".to_string()).chain(cli.protect));
    let engine = DiskEngine::new(Arc::new(ShellRunner), guard);

    match cli.command {
        Commands::List => {
            let devices = engine.discovery().list_devices().await;
            if devices.is_empty() {
                println!("No removable disks found.");
            } else {
                println!("Removable disks:\n");
                for device in devices {
                    match device {
                        Device::Physical(disk) => print_disk(&disk),
                        Device::Logical(drive) => print_logical(&drive),
                    }
                }
            }
        }
        Commands::Info { disk } => match engine.discovery().disk_detail(disk).await {
            Some(detail) => print_disk(&detail),
            None => eprintln!("Disk {} not found.", disk),
        },
        Commands::Volume { letter } => match engine.discovery().volume_info(letter).await {
            Some(info) => {
                println!("Volume {} ({})", info.letter, info.label);
                println!("  Filesystem: {}", info.filesystem);
                println!("  Size: {:.2} GB", info.size_gb);
                println!("  Free: {:.2} GB", info.free_gb);
                println!("  Used: {:.2} GB", info.used_gb);
                println!("  Type: {}", info.drive_type.description());
                if let Some(number) = info.disk_number {
                    println!("  Disk: {}", number);
                }
                if info.is_protected {
                    println!("  Protected: Yes");
                }
            }
            None => eprintln!("No volume mounted at {}.", letter),
        },
        Commands::Partitions { disk } => {
            let partitions = engine.discovery().partitions(disk).await;
            if partitions.is_empty() {
                println!("No partitions on disk {}.", disk);
            } else {
                println!("Partitions on disk {}:\n", disk);
                for partition in &partitions {
                    print_partition(partition);
                }
            }
        }
        Commands::Letters => {
            let letters = engine.partitions().available_letters().await;
            let rendered: Vec<String> = letters.iter().map(|l| l.to_string()).collect();
            println!("Available drive letters: {}", rendered.join(" "));
        }
        Commands::Format {
            letter,
            disk,
            filesystem,
            label,
            full,
            yes,
        } => {
            let request = FormatRequest {
                letter,
                disk_number: disk,
                filesystem,
                label,
                quick: !full,
            };
            let target = match (request.disk_number, request.letter) {
                (Some(number), _) => format!("disk {}", number),
                (None, Some(letter)) => format!("volume {}", letter),
                (None, None) => {
                    anyhow::bail!("name a volume (--letter) or a disk (--disk) to format")
                }
            };
            if !yes && !confirm(&format!("This will ERASE ALL DATA on {}!", target))? {
                println!("Format cancelled.");
                return Ok(());
            }
            println!(
                "Formatting {} as {}...",
                target,
                request.filesystem.to_uppercase()
            );
            match engine.formatter().format(&request).await {
                Ok(report) => println!("{}", report.message),
                Err(e) => eprintln!("Format failed: {}", e),
            }
        }
        Commands::Rebuild {
            disk,
            filesystem,
            label,
            yes,
        } => {
            if !yes && !confirm(&format!("This will ERASE ALL DATA on disk {}!", disk))? {
                println!("Rebuild cancelled.");
                return Ok(());
            }
            println!("Rebuilding disk {} as {}...", disk, filesystem.to_uppercase());
            match engine.lifecycle().rebuild(disk, &filesystem, &label).await {
                Ok(report) => println!("{}", report.message),
                Err(e) => eprintln!("Rebuild failed: {}", e),
            }
        }
        Commands::Clean { disk, yes } => {
            if !yes && !confirm(&format!("This will ERASE ALL DATA on disk {}!", disk))? {
                println!("Clean cancelled.");
                return Ok(());
            }
            match engine.lifecycle().clean(disk).await {
                Ok(report) => println!("{}", report.message),
                Err(e) => eprintln!("Clean failed: {}", e),
            }
        }
        Commands::Init { disk, style } => {
            let style = match style.to_lowercase().as_str() {
                "mbr" => PartitionStyle::Mbr,
                "gpt" => PartitionStyle::Gpt,
                _ => {
                    eprintln!("Unknown partition style: {}", style);
                    return Ok(());
                }
            };
            match engine.lifecycle().initialize(disk, style).await {
                Ok(report) => println!("{}", report.message),
                Err(e) => eprintln!("Initialize failed: {}", e),
            }
        }
        Commands::Online { disk } => match engine.lifecycle().set_online(disk).await {
            Ok(report) => println!("{}", report.message),
            Err(e) => eprintln!("Online failed: {}", e),
        },
        Commands::ReadWrite { disk } => match engine.lifecycle().set_read_write(disk).await {
            Ok(report) => println!("{}", report.message),
            Err(e) => eprintln!("Read-write failed: {}", e),
        },
        Commands::Assign {
            disk,
            partition,
            letter,
        } => match engine.partitions().assign_letter(disk, partition, letter).await {
            Ok(report) => println!("{}", report.message),
            Err(e) => eprintln!("Assign failed: {}", e),
        },
        Commands::Unassign { disk, partition } => {
            match engine.partitions().remove_letter(disk, partition).await {
                Ok(report) => println!("{}", report.message),
                Err(e) => eprintln!("Unassign failed: {}", e),
            }
        }
        Commands::CreatePartition {
            disk,
            size_gb,
            filesystem,
            label,
        } => {
            match engine
                .partitions()
                .create_partition(disk, size_gb, &filesystem, &label)
                .await
            {
                Ok(report) => println!("{}", report.message),
                Err(e) => eprintln!("Create partition failed: {}", e),
            }
        }
        Commands::DeletePartition {
            disk,
            partition,
            yes,
        } => {
            if !yes
                && !confirm(&format!(
                    "This will ERASE partition {} on disk {}!",
                    partition, disk
                ))?
            {
                println!("Delete cancelled.");
                return Ok(());
            }
            match engine.partitions().delete_partition(disk, partition).await {
                Ok(report) => println!("{}", report.message),
                Err(e) => eprintln!("Delete partition failed: {}", e),
            }
        }
    }

    Ok(())
}

/// Destructive commands stop here unless --yes was passed.
fn confirm(warning: &str) -> anyhow::Result<bool> {
    use std::io::{self, BufRead};

    println!("WARNING: {}", warning);
    println!("Type 'yes' to continue: ");
    let stdin = io::stdin();
    let mut line = String::new();
    stdin.lock().read_line(&mut line)?;
    Ok(line.trim() == "yes")
}

fn print_disk(disk: &PhysicalDisk) {
    println!("Disk {}: {}", disk.number, disk.friendly_name);
    println!("  Size: {:.2} GB", disk.size_gb);
    println!("  Style: {:?}", disk.style);
    println!("  Status: {} ({})", disk.status, disk.health);
    if let Some(bus) = &disk.bus_type {
        println!("  Bus: {}", bus);
    }
    println!("  Offline: {}", if disk.is_offline { "Yes" } else { "No" });
    println!(
        "  Read-only: {}",
        if disk.is_read_only { "Yes" } else { "No" }
    );
    if let Some(letter) = disk.primary_letter {
        println!("  Mounted at: {}", letter);
    }
    if !disk.partitions.is_empty() {
        println!("  Partitions:");
        for partition in &disk.partitions {
            let letter = match partition.letter {
                Some(letter) => letter.to_string(),
                None => "--".to_string(),
            };
            println!(
                "    {}. {} {:.2} GB ({})",
                partition.number, letter, partition.size_gb, partition.kind
            );
        }
    }
    println!();
}

fn print_logical(drive: &LogicalDrive) {
    println!("Volume {} ({})", drive.letter, drive.label);
    println!("  Filesystem: {}", drive.filesystem);
    println!(
        "  Size: {:.2} GB ({:.2} GB free)",
        drive.size_gb, drive.free_gb
    );
    println!(
        "  Removable: {}",
        if drive.is_removable { "Yes" } else { "No" }
    );
    println!();
}

fn print_partition(partition: &Partition) {
    let letter = match partition.letter {
        Some(letter) => letter.to_string(),
        None => "(no letter)".to_string(),
    };
    println!("Partition {}: {}", partition.number, letter);
    println!("  Size: {:.2} GB", partition.size_gb);
    println!("  Type: {}", partition.kind);
    println!(
        "  Active: {}",
        if partition.is_active { "Yes" } else { "No" }
    );
    println!();
}
