//! Device registry and controller opening
//!
//! Two ways to get at a NAND chip live here: the named [`DeviceRegistry`]
//! that the driver registers its block device into (`register_nand`), and
//! [`open_nand`], which turns a controller string into a [`DeviceHandle`].

use std::collections::{BTreeMap, HashMap};

use nandflash_core::chip::ChipDatabase;
#[cfg(feature = "sim")]
use nandflash_core::chip::ChipDescriptor;
use nandflash_core::config::DriverOptions;
use nandflash_core::controller::NandController;
use nandflash_core::flash::{BlockDevice, NandContext, NandDevice, OpenFlags, PageAddr};

use crate::error::DeviceError;
use crate::handle::DeviceHandle;

/// Name the NAND driver registers its block device under
pub const NAND_DEVICE_NAME: &str = "nand";

/// Chip emulated when no `chip=` parameter is given
pub const DEFAULT_CHIP: &str = "H27UBG8T2A";

struct Registered {
    device: Box<dyn BlockDevice>,
    flags: OpenFlags,
}

/// Named block devices
#[derive(Default)]
pub struct DeviceRegistry {
    devices: BTreeMap<String, Registered>,
}

impl DeviceRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a device under `name` with the access it allows
    pub fn register(
        &mut self,
        name: &str,
        device: Box<dyn BlockDevice>,
        flags: OpenFlags,
    ) -> Result<(), DeviceError> {
        if self.devices.contains_key(name) {
            return Err(DeviceError::AlreadyRegistered(name.to_string()));
        }
        log::debug!("Registered block device '{}' ({:?})", name, flags);
        self.devices
            .insert(name.to_string(), Registered { device, flags });
        Ok(())
    }

    /// Remove a device, handing it back
    pub fn unregister(&mut self, name: &str) -> Option<Box<dyn BlockDevice>> {
        self.devices.remove(name).map(|r| r.device)
    }

    /// Look up a device without opening it
    pub fn find(&mut self, name: &str) -> Option<&mut dyn BlockDevice> {
        let entry = self.devices.get_mut(name)?;
        Some(entry.device.as_mut())
    }

    /// Access a device was registered with
    pub fn flags(&self, name: &str) -> Option<OpenFlags> {
        self.devices.get(name).map(|r| r.flags)
    }

    /// Open a device
    ///
    /// `flags` must be within what the device was registered with.
    pub fn open(
        &mut self,
        name: &str,
        flags: OpenFlags,
    ) -> Result<&mut dyn BlockDevice, DeviceError> {
        let entry = self
            .devices
            .get_mut(name)
            .ok_or_else(|| DeviceError::NoSuchDevice(name.to_string()))?;
        if !entry.flags.contains(flags) {
            return Err(DeviceError::AccessDenied {
                name: name.to_string(),
                requested: flags,
            });
        }
        entry.device.open(flags)?;
        Ok(entry.device.as_mut())
    }

    /// Names of registered devices, sorted
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.devices.keys().map(String::as_str)
    }

    /// Number of registered devices
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Whether no device is registered
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

/// Bring a NAND chip up and register it as `"nand"` for reading and writing
///
/// The controller is configured, chip 0 reset and its ID checked before
/// anything is registered; any failure leaves the registry untouched.
pub fn register_nand<C>(
    registry: &mut DeviceRegistry,
    ctrl: C,
    ctx: NandContext,
) -> Result<(), DeviceError>
where
    C: NandController + 'static,
{
    let mut device = NandDevice::new(ctrl, ctx);
    if let Err(e) = device.init() {
        log::error!("NAND init failed: {}", e);
        return Err(e.into());
    }
    registry.register(NAND_DEVICE_NAME, Box::new(device), OpenFlags::RDWR)
}

/// Parsed controller parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerParams {
    /// Controller name
    pub name: String,
    /// Key-value parameters
    pub params: HashMap<String, String>,
}

impl ControllerParams {
    fn parse_value<T: std::str::FromStr>(&self, key: &str) -> Result<Option<T>, DeviceError> {
        self.params
            .get(key)
            .map(|v| {
                v.parse().map_err(|_| DeviceError::InvalidValue {
                    key: key.to_string(),
                    value: v.clone(),
                })
            })
            .transpose()
    }

    fn parse_page(&self, key: &str) -> Result<Option<PageAddr>, DeviceError> {
        let Some(value) = self.params.get(key) else {
            return Ok(None);
        };
        let invalid = || DeviceError::InvalidValue {
            key: key.to_string(),
            value: value.clone(),
        };
        let (block, page) = value.split_once('/').ok_or_else(invalid)?;
        let block = block.trim().parse().map_err(|_| invalid())?;
        let page = page.trim().parse().map_err(|_| invalid())?;
        Ok(Some(PageAddr::new(block, page)))
    }
}

/// Parse a controller string into name and parameters
///
/// Format: "name" or "name:key1=value1,key2=value2"
///
/// # Example
/// ```ignore
/// let params = parse_controller_params("sim:chip=H27UBG8T2A")?;
/// assert_eq!(params.name, "sim");
/// assert_eq!(params.params.get("chip"), Some(&"H27UBG8T2A".to_string()));
/// ```
pub fn parse_controller_params(s: &str) -> Result<ControllerParams, DeviceError> {
    let (name, opts_str) = s.split_once(':').unwrap_or((s, ""));

    let mut params = HashMap::new();
    if !opts_str.is_empty() {
        for opt in opts_str.split(',') {
            match opt.split_once('=') {
                Some((key, value)) => {
                    params.insert(key.to_string(), value.to_string());
                }
                None => return Err(DeviceError::InvalidParameter(opt.to_string())),
            }
        }
    }

    Ok(ControllerParams {
        name: name.to_string(),
        params,
    })
}

#[cfg(feature = "sim")]
fn lookup_chip(db: &ChipDatabase, name: Option<&str>) -> Result<ChipDescriptor, DeviceError> {
    let name = name.unwrap_or(DEFAULT_CHIP);
    db.find_by_name(name)
        .cloned()
        .ok_or_else(|| DeviceError::UnknownChip(name.to_string()))
}

/// Open a NAND controller and bring the chip up
///
/// This is the main entry point for the CLI. It handles:
/// 1. Parsing the controller string
/// 2. Creating the controller backend for the chosen chip
/// 3. Configuring the controller, resetting the chip and checking its ID
/// 4. Opening the device for reading and writing
///
/// # Arguments
/// * `controller` - Controller specification (e.g., "sim" or "sim:chip=H27UBG8T2A")
/// * `db` - Chip database to resolve chip names
/// * `opts` - Bus clock, ECC policy and poll limits
pub fn open_nand(
    controller: &str,
    db: &ChipDatabase,
    opts: &DriverOptions,
) -> Result<DeviceHandle, DeviceError> {
    let params = parse_controller_params(controller)?;

    match params.name.as_str() {
        #[cfg(feature = "sim")]
        "sim" | "dummy" => open_sim(&params, db, opts),

        _ => Err(DeviceError::UnknownController(params.name.clone())),
    }
}

#[cfg(feature = "sim")]
fn open_sim(
    params: &ControllerParams,
    db: &ChipDatabase,
    opts: &DriverOptions,
) -> Result<DeviceHandle, DeviceError> {
    use crate::handle::SimBackend;
    use nandflash_sim::{Fault, SimController};

    let chip = lookup_chip(db, params.params.get("chip").map(String::as_str))?;
    log::info!("Opening simulated {} {}...", chip.vendor, chip.name);

    let mut sim = SimController::from_descriptor(&chip);

    let image = params.params.get("image").map(std::path::PathBuf::from);
    if let Some(path) = &image {
        if path.exists() {
            sim.load_image(path)?;
            log::info!(
                "Loaded {} programmed pages from {}",
                sim.programmed_pages(),
                path.display()
            );
        } else {
            log::info!("Image {} does not exist yet, starting erased", path.display());
        }
    }

    if let Some(addr) = params.parse_page("fail_program")? {
        sim.inject(Fault::FailProgram(addr));
    }
    if let Some(addr) = params.parse_page("corrupt")? {
        sim.inject(Fault::CorruptProgram(addr));
    }
    if let Some(block) = params.parse_value::<u32>("fail_erase")? {
        sim.inject(Fault::FailErase(block));
    }

    for key in params.params.keys() {
        if !matches!(
            key.as_str(),
            "chip" | "image" | "fail_program" | "corrupt" | "fail_erase"
        ) {
            log::warn!("Ignoring unknown sim parameter '{}'", key);
        }
    }

    let ctx = NandContext::new(chip, opts)?;
    DeviceHandle::open(Box::new(SimBackend::new(sim, image)), ctx)
}

// Controller information and listing
/// Information about a controller backend
pub struct ControllerInfo {
    /// Primary name (used for matching)
    pub name: &'static str,
    /// Alternative names/aliases
    pub aliases: &'static [&'static str],
    /// Short description
    pub description: &'static str,
}

/// Get information about all available controllers (enabled at compile time)
#[allow(unused_mut, clippy::vec_init_then_push)]
pub fn available_controllers() -> Vec<ControllerInfo> {
    let mut controllers = Vec::new();

    #[cfg(feature = "sim")]
    controllers.push(ControllerInfo {
        name: "sim",
        aliases: &["dummy"],
        description: "In-memory NAND emulator (chip=<name>,image=<path>,fail_program=<b>/<p>,\
                      corrupt=<b>/<p>,fail_erase=<b>)",
    });

    controllers
}

/// Generate a short list of controller names for CLI help
pub fn controller_names_short() -> String {
    let controllers = available_controllers();
    if controllers.is_empty() {
        return "none (recompile with features)".to_string();
    }
    let names: Vec<&str> = controllers.iter().map(|c| c.name).collect();
    names.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use nandflash_core::chip::ChipDescriptor;
    use nandflash_core::flash::{BlockGeometry, ControlCommand, ControlResponse};
    use nandflash_sim::{Fault, SimConfig, SimController};

    fn small_db() -> ChipDatabase {
        let mut db = ChipDatabase::with_builtin();
        db.add(SimConfig::small_chip());
        db
    }

    fn small_ctx() -> (SimController, NandContext) {
        let chip = SimConfig::small_chip();
        let sim = SimController::from_descriptor(&chip);
        let ctx = NandContext::new(chip, &DriverOptions::default()).unwrap();
        (sim, ctx)
    }

    #[test]
    fn test_parse_params() {
        let params = parse_controller_params("sim:chip=SIM2K,fail_erase=3").unwrap();
        assert_eq!(params.name, "sim");
        assert_eq!(params.params.get("chip").map(String::as_str), Some("SIM2K"));
        assert_eq!(params.parse_value::<u32>("fail_erase").unwrap(), Some(3));
        assert_eq!(params.parse_value::<u32>("missing").unwrap(), None);

        let bare = parse_controller_params("sim").unwrap();
        assert!(bare.params.is_empty());

        assert!(matches!(
            parse_controller_params("sim:chip"),
            Err(DeviceError::InvalidParameter(p)) if p == "chip"
        ));
    }

    #[test]
    fn test_parse_page_param() {
        let params = parse_controller_params("sim:fail_program=4/17,corrupt=4").unwrap();
        assert_eq!(
            params.parse_page("fail_program").unwrap(),
            Some(PageAddr::new(4, 17))
        );
        assert!(matches!(
            params.parse_page("corrupt"),
            Err(DeviceError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_register_nand() {
        let (sim, ctx) = small_ctx();
        let mut registry = DeviceRegistry::new();
        register_nand(&mut registry, sim, ctx).unwrap();

        assert_eq!(registry.names().collect::<Vec<_>>(), ["nand"]);
        assert_eq!(registry.flags("nand"), Some(OpenFlags::RDWR));

        let dev = registry.open("nand", OpenFlags::RDWR).unwrap();
        let expected = BlockGeometry {
            bytes_per_sector: 2048,
            block_size: 2048 * 16,
            sector_count: 1024,
        };
        assert_eq!(
            dev.control(ControlCommand::GetGeometry).unwrap(),
            ControlResponse::Geometry(expected)
        );

        let data = vec![0xa5; 2048];
        assert_eq!(dev.write(100, &data, 1).unwrap(), 1);
        let mut back = vec![0u8; 2048];
        assert_eq!(dev.read(100, &mut back, 1).unwrap(), 1);
        assert_eq!(back, data);
    }

    #[test]
    fn test_init_failure_prevents_registration() {
        let (mut sim, ctx) = small_ctx();
        sim.inject(Fault::NeverReady(0));
        let mut registry = DeviceRegistry::new();

        assert!(matches!(
            register_nand(&mut registry, sim, ctx),
            Err(DeviceError::Flash(nandflash_core::Error::InitTimeout))
        ));
        assert!(registry.is_empty());
        assert!(registry.find("nand").is_none());
    }

    #[test]
    fn test_foreign_chip_prevents_registration() {
        let chip = SimConfig::small_chip();
        let sim = SimController::from_descriptor(&ChipDescriptor::hynix_h27ubg8t2a());
        let ctx = NandContext::new(chip, &DriverOptions::default()).unwrap();
        let mut registry = DeviceRegistry::new();

        assert!(matches!(
            register_nand(&mut registry, sim, ctx),
            Err(DeviceError::Flash(nandflash_core::Error::UnrecognizedDevice))
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_registry_rules() {
        let (sim, ctx) = small_ctx();
        let mut registry = DeviceRegistry::new();
        let device = NandDevice::new(sim, ctx);
        registry
            .register("ro", Box::new(device), OpenFlags::RDONLY)
            .unwrap();

        let (sim, ctx) = small_ctx();
        assert!(matches!(
            registry.register("ro", Box::new(NandDevice::new(sim, ctx)), OpenFlags::RDWR),
            Err(DeviceError::AlreadyRegistered(_))
        ));
        assert!(matches!(
            registry.open("ro", OpenFlags::RDWR),
            Err(DeviceError::AccessDenied { .. })
        ));
        assert!(registry.open("ro", OpenFlags::RDONLY).is_ok());
        assert!(matches!(
            registry.open("missing", OpenFlags::RDONLY),
            Err(DeviceError::NoSuchDevice(_))
        ));

        assert!(registry.unregister("ro").is_some());
        assert!(registry.is_empty());
    }

    #[cfg(feature = "sim")]
    #[test]
    fn test_open_nand_sim() {
        let db = small_db();
        let mut handle = open_nand("sim:chip=sim2k", &db, &DriverOptions::default()).unwrap();
        assert_eq!(handle.chip_info().name, "SIM2K");
        assert_eq!(handle.geometry().sector_count, 1024);

        let hynix = open_nand("sim", &db, &DriverOptions::default()).unwrap();
        assert_eq!(hynix.chip_info().name, DEFAULT_CHIP);

        let data = vec![0x3c; 2048];
        handle.write(0, &data).unwrap();
        handle.close().unwrap();
    }

    #[cfg(feature = "sim")]
    #[test]
    fn test_open_nand_with_fault() {
        let db = small_db();
        let mut handle =
            open_nand("sim:chip=SIM2K,fail_erase=2", &db, &DriverOptions::default()).unwrap();
        assert!(matches!(
            handle.erase_block(2),
            Err(DeviceError::Flash(nandflash_core::Error::EraseFailure { block: 2 }))
        ));
        handle.erase_block(2).unwrap();
    }

    #[test]
    fn test_open_nand_errors() {
        let db = small_db();
        let opts = DriverOptions::default();
        assert!(matches!(
            open_nand("ch341a", &db, &opts),
            Err(DeviceError::UnknownController(name)) if name == "ch341a"
        ));
        assert!(matches!(
            open_nand("sim:chip=K9F1G08", &db, &opts),
            Err(DeviceError::UnknownChip(_))
        ));
        assert!(matches!(
            open_nand("sim:chip=SIM2K,fail_erase=x", &db, &opts),
            Err(DeviceError::InvalidValue { .. })
        ));
    }

    #[cfg(feature = "sim")]
    #[test]
    fn test_controller_listing() {
        let names = controller_names_short();
        assert!(names.contains("sim"));
        assert!(available_controllers()
            .iter()
            .any(|c| c.aliases.contains(&"dummy")));
    }
}
