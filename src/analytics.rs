//! fixed sample analytics and the public status badge
//!
//! The operator dashboard KPIs and the admin panel show canned figures; only
//! the public status badge moves, redrawn every status period.

use rand::Rng;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

// ==============================================================================
// operator dashboard
// ==============================================================================

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Kpi {
    pub title: &'static str,
    pub value: &'static str,
    pub unit: &'static str,
    pub change: &'static str,
    pub is_positive: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NamedValue {
    pub name: &'static str,
    pub value: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Success,
    Warning,
    Error,
    Info,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ActivityAlert {
    pub title: &'static str,
    pub time: &'static str,
    pub status: AlertLevel,
    pub message: &'static str,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardAnalytics {
    pub kpis: Vec<Kpi>,
    pub production: Vec<NamedValue>,
    pub efficiency: Vec<NamedValue>,
    pub reserves: Vec<NamedValue>,
    pub recent_activity: Vec<ActivityAlert>,
}

fn series(points: &[(&'static str, f64)]) -> Vec<NamedValue> {
    points.iter().map(|&(name, value)| NamedValue { name, value }).collect()
}

pub fn dashboard_analytics() -> DashboardAnalytics {
    DashboardAnalytics {
        kpis: vec![
            Kpi { title: "Daily Production", value: "14.6M", unit: "barrels", change: "+5.3%", is_positive: true },
            Kpi { title: "System Efficiency", value: "87.3", unit: "%", change: "+2.1%", is_positive: true },
            Kpi { title: "Reserve Capacity", value: "438.2B", unit: "barrels", change: "-1.2%", is_positive: false },
            Kpi { title: "Distribution Rate", value: "12.3M", unit: "b/day", change: "+3.7%", is_positive: true },
        ],
        production: series(&[
            ("Jan", 4000.0), ("Feb", 3000.0), ("Mar", 5000.0), ("Apr", 4500.0),
            ("May", 6000.0), ("Jun", 5500.0), ("Jul", 7000.0), ("Aug", 8000.0),
        ]),
        efficiency: series(&[
            ("Jan", 85.0), ("Feb", 83.0), ("Mar", 86.0), ("Apr", 87.0),
            ("May", 89.0), ("Jun", 92.0), ("Jul", 91.0), ("Aug", 94.0),
        ]),
        reserves: series(&[
            ("A1", 800.0), ("B2", 1200.0), ("C3", 1400.0),
            ("D4", 900.0), ("E5", 1600.0), ("F6", 1100.0),
        ]),
        recent_activity: vec![
            ActivityAlert {
                title: "Production rate exceeded target",
                time: "2 hours ago",
                status: AlertLevel::Success,
                message: "Sector A-7 production rate is 105% of daily target",
            },
            ActivityAlert {
                title: "Equipment maintenance required",
                time: "5 hours ago",
                status: AlertLevel::Warning,
                message: "Pump station 23B requires scheduled maintenance",
            },
            ActivityAlert {
                title: "Pipeline pressure fluctuation",
                time: "12 hours ago",
                status: AlertLevel::Error,
                message: "Minor pressure fluctuations detected in sector C-4",
            },
            ActivityAlert {
                title: "New reserve discovered",
                time: "18 hours ago",
                status: AlertLevel::Info,
                message: "Initial analysis shows potential new reserve in region NE-12",
            },
        ],
    }
}

// ==============================================================================
// admin panel
// ==============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RegionStatus {
    Active,
    Warning,
    Inactive,
}

impl RegionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RegionStatus::Active => "active",
            RegionStatus::Warning => "warning",
            RegionStatus::Inactive => "inactive",
        }
    }
}

impl fmt::Display for RegionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `?region=` filter on the admin panel
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RegionFilter {
    #[default]
    All,
    Only(RegionStatus),
}

impl FromStr for RegionFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "all" => Ok(RegionFilter::All),
            "active" => Ok(RegionFilter::Only(RegionStatus::Active)),
            "warning" => Ok(RegionFilter::Only(RegionStatus::Warning)),
            "inactive" => Ok(RegionFilter::Only(RegionStatus::Inactive)),
            other => Err(format!("unknown region filter '{}'", other)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub total: u32,
    pub active: u32,
    pub new: u32,
    pub admins: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Region {
    pub id: &'static str,
    pub name: &'static str,
    pub users: u32,
    pub status: RegionStatus,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RoleShare {
    pub name: &'static str,
    pub value: u32,
    pub color: &'static str,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminUser {
    pub name: &'static str,
    pub role: &'static str,
    pub region: &'static str,
    pub active: bool,
    pub last_active: &'static str,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminAnalytics {
    pub users: UserSummary,
    pub regions: Vec<Region>,
    pub roles: Vec<RoleShare>,
    pub monthly_access: Vec<NamedValue>,
    pub recent_users: Vec<AdminUser>,
}

const REGIONS: [Region; 8] = [
    Region { id: "NE-01", name: "Assam Central", users: 5642, status: RegionStatus::Active },
    Region { id: "NE-02", name: "Arunachal North", users: 4218, status: RegionStatus::Active },
    Region { id: "NE-03", name: "Manipur Corridor", users: 3561, status: RegionStatus::Warning },
    Region { id: "NE-04", name: "Meghalaya Hills", users: 2987, status: RegionStatus::Active },
    Region { id: "NE-05", name: "Nagaland East", users: 2453, status: RegionStatus::Inactive },
    Region { id: "NE-06", name: "Tripura South", users: 2211, status: RegionStatus::Active },
    Region { id: "NE-07", name: "Mizoram Border", users: 1843, status: RegionStatus::Warning },
    Region { id: "NE-08", name: "Sikkim Heights", users: 1867, status: RegionStatus::Active },
];

pub fn admin_analytics(filter: RegionFilter) -> AdminAnalytics {
    let regions = REGIONS
        .iter()
        .filter(|r| match filter {
            RegionFilter::All => true,
            RegionFilter::Only(status) => r.status == status,
        })
        .cloned()
        .collect();

    AdminAnalytics {
        users: UserSummary { total: 24782, active: 18345, new: 1243, admins: 127 },
        regions,
        roles: vec![
            RoleShare { name: "Engineers", value: 8432, color: "#00FFFF" },
            RoleShare { name: "Analysts", value: 6218, color: "#9B30FF" },
            RoleShare { name: "Field Operators", value: 5634, color: "#FF4500" },
            RoleShare { name: "Management", value: 2321, color: "#39FF14" },
            RoleShare { name: "Support Staff", value: 2177, color: "#FF1493" },
        ],
        monthly_access: series(&[
            ("Jan", 2300.0), ("Feb", 2500.0), ("Mar", 3200.0), ("Apr", 4500.0),
            ("May", 4200.0), ("Jun", 5100.0), ("Jul", 5800.0), ("Aug", 6200.0),
        ]),
        recent_users: vec![
            AdminUser { name: "Alex Sharma", role: "Senior Engineer", region: "NE-01", active: true, last_active: "2 minutes ago" },
            AdminUser { name: "Priya Mehta", role: "Regional Manager", region: "NE-03", active: true, last_active: "1 hour ago" },
            AdminUser { name: "Rahul Verma", role: "Data Analyst", region: "NE-02", active: true, last_active: "20 minutes ago" },
            AdminUser { name: "Sunita Patel", role: "Field Operator", region: "NE-04", active: false, last_active: "3 days ago" },
            AdminUser { name: "Dev Singh", role: "Security Admin", region: "NE-01", active: true, last_active: "5 hours ago" },
        ],
    }
}

/// total number of regions regardless of filter
pub fn region_count() -> usize {
    REGIONS.len()
}

// ==============================================================================
// public status badge
// ==============================================================================

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PipelineStatus {
    #[default]
    Operational,
    UnderMaintenance,
    Offline,
}

impl PipelineStatus {
    /// 80% operational, 15% maintenance, 5% offline
    pub fn draw<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::from_roll(rng.gen::<f64>())
    }

    pub fn from_roll(roll: f64) -> Self {
        if roll < 0.80 {
            PipelineStatus::Operational
        } else if roll < 0.95 {
            PipelineStatus::UnderMaintenance
        } else {
            PipelineStatus::Offline
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PipelineStatus::Operational => "Operational",
            PipelineStatus::UnderMaintenance => "Under Maintenance",
            PipelineStatus::Offline => "Offline",
        }
    }

    /// badge color on the landing page
    pub fn color(self) -> &'static str {
        match self {
            PipelineStatus::Operational => "green",
            PipelineStatus::UnderMaintenance => "orange",
            PipelineStatus::Offline => "red",
        }
    }
}
