//! ==============================================================================
//! views.rs - server-rendered html pages
//! ==============================================================================
//!
//! purpose:
//!     turns context data into the console pages. charts and the 3d pipeline
//!     view are left to the browser; the pages carry tables, status badges and
//!     a small script that follows the telemetry / notification streams.
//!
//! relationships:
//!     - used by: server.rs (every html handler)
//!
//! ==============================================================================

use std::fmt::Write as _;

use crate::analytics::{AdminAnalytics, DashboardAnalytics, PipelineStatus, RegionFilter};
use crate::domain::{HealthStatus, Metric, Theme, ThresholdSettings, User};
use crate::session::{CredentialError, CredentialField};
use crate::simulation::SimulationSnapshot;
use crate::telemetry::TelemetryFrame;

/// escape html special characters to prevent xss
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

const STYLE: &str = r#"
:root { --bg: #111; --card: #1c1c24; --text: #eee; --muted: #999; --accent: #00ffff; }
html[data-theme="light"] { --bg: #f4f5f7; --card: #fff; --text: #111; --muted: #555; --accent: #0077aa; }
* { box-sizing: border-box; }
body { font-family: system-ui, sans-serif; margin: 0; background: var(--bg); color: var(--text); }
header { display: flex; justify-content: space-between; align-items: center; padding: 1rem 2rem; background: var(--card); }
header nav a { margin-right: 1rem; color: var(--accent); text-decoration: none; }
header nav a.active { text-decoration: underline; }
main { padding: 1.5rem 2rem; }
.grid { display: grid; grid-template-columns: repeat(auto-fit, minmax(220px, 1fr)); gap: 1rem; }
.card { background: var(--card); border-radius: 8px; padding: 1rem; }
.muted { color: var(--muted); }
.normal, .green, .active { color: #39ff14; }
.warning, .orange { color: #ffa500; }
.critical, .red, .error { color: #ff4500; }
table { width: 100%; border-collapse: collapse; }
th, td { text-align: left; padding: 0.35rem 0.5rem; border-bottom: 1px solid #333; }
.field-error { color: #ff4500; font-size: 0.85rem; }
#toasts { position: fixed; bottom: 1rem; right: 1rem; }
#toasts div { background: var(--card); padding: 0.75rem 1rem; margin-top: 0.5rem; border-left: 4px solid var(--accent); }
"#;

const TOAST_SCRIPT: &str = r#"
<script>
(function () {
  var box = document.getElementById('toasts');
  if (!box || !window.EventSource) return;
  var es = new EventSource('/api/notifications');
  es.addEventListener('notice', function (e) {
    var n = JSON.parse(e.data), el = document.createElement('div');
    el.textContent = n.title + ': ' + n.description;
    box.appendChild(el);
    setTimeout(function () { el.remove(); }, 4000);
  });
})();
</script>"#;

const NAV: [(&str, &str); 4] = [
    ("/dashboard", "Dashboard"),
    ("/simulation", "Simulation"),
    ("/admin", "Admin"),
    ("/settings", "Settings"),
];

/// the shared page shell; `user` switches between the operator and public header
fn layout(title: &str, theme: Theme, user: Option<&User>, active: &str, body: &str) -> String {
    let header = match user {
        Some(user) => {
            let mut links = String::new();
            for (path, label) in NAV {
                let class = if path == active { " class=\"active\"" } else { "" };
                let _ = write!(links, r#"<a href="{}"{}>{}</a>"#, path, class, label);
            }
            format!(
                r#"<header><strong>69-BH12-NER</strong><nav>{}</nav>
<form method="post" action="/logout"><span class="muted">{}</span> <button type="submit">Logout</button></form></header>"#,
                links,
                html_escape(&user.email)
            )
        }
        None => r#"<header><strong>69-BH12-NER</strong><nav><a href="/">Home</a><a href="/login">Login</a></nav></header>"#
            .to_string(),
    };
    format!(
        r#"<!doctype html>
<html lang="en" data-theme="{theme}">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title} | 69-BH12-NER</title>
<style>{STYLE}</style>
</head>
<body>
{header}
<main>
{body}
</main>
<div id="toasts"></div>
{TOAST_SCRIPT}
</body>
</html>"#,
        theme = theme.as_str(),
        title = html_escape(title),
    )
}

// ==============================================================================
// public pages
// ==============================================================================

pub fn landing(status: PipelineStatus, theme: Theme) -> String {
    let pillars = [
        ("Reliability through Automation", "Autonomous systems keep the network up through continuous monitoring and predictive maintenance."),
        ("Real-time Predictive Intelligence", "Analytics flag potential issues before they occur, enabling proactive intervention."),
        ("Community Safety via Alerting", "Instant notifications protect surrounding communities and coordinate emergency response."),
        ("Remote Accessibility with 5G and IoT", "Authorized personnel can monitor the system from anywhere."),
    ];
    let mut cards = String::new();
    for (title, text) in pillars {
        let _ = write!(cards, r#"<div class="card"><h3>{}</h3><p class="muted">{}</p></div>"#, title, text);
    }
    let body = format!(
        r#"<section>
<h1>Next Generation Pipeline Management System</h1>
<p class="muted">Secure, efficient, and intelligent control for critical infrastructure</p>
<p id="pipeline-status" class="{color}">Pipeline Status: {label}</p>
<p><a href="/login">Access Dashboard</a></p>
</section>
<section id="mission" class="grid">{cards}</section>
<footer class="muted"><p>&copy; 69-BH12-NER Pipeline System. All rights reserved.</p></footer>"#,
        color = status.color(),
        label = status.label(),
    );
    layout("Status", theme, None, "/", &body)
}

pub fn login(theme: Theme, email: &str, error: Option<&CredentialError>) -> String {
    let error_for = |field: CredentialField| {
        error
            .filter(|e| e.field == field)
            .map(|e| format!(r#"<p class="field-error">{}</p>"#, html_escape(&e.message)))
            .unwrap_or_default()
    };
    let body = format!(
        r#"<div class="card" style="max-width: 420px; margin: 2rem auto;">
<h2>Access Portal</h2>
<p class="muted">Enter your credentials to continue</p>
<form method="post" action="/login">
<label for="email">Email Address</label><br>
<input id="email" name="email" type="email" value="{email}" required>
{email_error}
<br><label for="password">Password</label><br>
<input id="password" name="password" type="password" required>
{password_error}
<br><label><input type="checkbox" name="remember" value="on" checked> Remember me</label>
<br><br><button type="submit">Sign in</button>
</form>
<p><a href="/">&larr; Back to home</a></p>
</div>"#,
        email = html_escape(email),
        email_error = error_for(CredentialField::Email),
        password_error = error_for(CredentialField::Password),
    );
    layout("Login", theme, None, "/login", &body)
}

pub fn not_found(theme: Theme, path: &str, code: u32) -> String {
    let body = format!(
        r#"<div class="card" style="max-width: 520px; margin: 2rem auto; text-align: center;">
<h1 class="critical">404</h1>
<p>The requested resource <code>{}</code> does not exist or you do not have clearance to access it.</p>
<p><a href="/">Return to Base</a></p>
<p class="muted">Error code: ACCESS-VIOLATION-{}</p>
</div>"#,
        html_escape(path),
        code
    );
    layout("Not Found", theme, None, "", &body)
}

// ==============================================================================
// operator pages
// ==============================================================================

fn status_cell(status: Option<HealthStatus>) -> String {
    match status {
        Some(s) => format!(r#"<span class="{0}">{0}</span>"#, s.as_str()),
        None => "-".to_string(),
    }
}

pub fn dashboard(theme: Theme, user: &User, analytics: &DashboardAnalytics, frame: &TelemetryFrame) -> String {
    let mut kpis = String::new();
    for kpi in &analytics.kpis {
        let _ = write!(
            kpis,
            r#"<div class="card"><p class="muted">{}</p><h2>{} <small>{}</small></h2><p class="{}">{}</p></div>"#,
            kpi.title,
            kpi.value,
            kpi.unit,
            if kpi.is_positive { "normal" } else { "warning" },
            kpi.change
        );
    }

    let mut latest = String::new();
    if let (Some(reading), Some(assessment)) = (frame.latest, frame.assessment) {
        for metric in Metric::ALL {
            let _ = write!(
                latest,
                r#"<div class="card"><p class="muted">{}</p><h2 id="latest-{:?}">{:.1} <small>{}</small></h2>{}</div>"#,
                metric.label(),
                metric,
                reading.value(metric),
                metric.unit(),
                status_cell(assessment.status(metric))
            );
        }
    }

    let mut rows = String::new();
    for point in frame.readings.iter().rev() {
        let r = &point.reading;
        let _ = write!(
            rows,
            "<tr><td>{}</td><td>{:.1}</td><td>{:.1}</td><td>{:.1}</td><td>{:.1}</td><td>{:.1}</td></tr>",
            point.time, r.pressure, r.temperature, r.flow_rate, r.vibration, r.humidity
        );
    }

    let mut activity = String::new();
    for alert in &analytics.recent_activity {
        let _ = write!(
            activity,
            r#"<li><strong>{}</strong> <span class="muted">{}</span><br>{}</li>"#,
            alert.title, alert.time, alert.message
        );
    }

    let overall = frame.assessment.map(|a| a.overall);
    let body = format!(
        r#"<h1>Welcome, {name}</h1>
<section class="grid">{kpis}</section>
<h2>Pipeline Health Monitor <small id="overall">{overall}</small></h2>
<p class="muted">Thresholds: {p} PSI / {t} &deg;C / {f} L/min &middot; update every {interval} ms</p>
<section class="grid">{latest}</section>
<div class="card"><table id="readings">
<thead><tr><th>Time</th><th>Pressure</th><th>Temperature</th><th>Flow Rate</th><th>Vibration</th><th>Humidity</th></tr></thead>
<tbody>{rows}</tbody></table></div>
<h2>Recent Activity</h2><ul>{activity}</ul>
<script>
(function () {{
  if (!window.EventSource) return;
  var es = new EventSource('/api/telemetry/stream');
  es.addEventListener('telemetry', function (e) {{
    var f = JSON.parse(e.data), body = document.querySelector('#readings tbody');
    body.innerHTML = '';
    f.readings.slice().reverse().forEach(function (r) {{
      var tr = document.createElement('tr');
      [r.time, r.pressure, r.temperature, r.flowRate, r.vibration, r.humidity].forEach(function (v) {{
        var td = document.createElement('td'); td.textContent = v; tr.appendChild(td);
      }});
      body.appendChild(tr);
    }});
    if (f.assessment) document.getElementById('overall').textContent = f.assessment.overall;
  }});
}})();
</script>"#,
        name = html_escape(user.display_name()),
        overall = status_cell(overall),
        p = frame.thresholds.pressure,
        t = frame.thresholds.temperature,
        f = frame.thresholds.flow_rate,
        interval = frame.interval_ms,
    );
    layout("Dashboard", theme, Some(user), "/dashboard", &body)
}

pub fn simulation(theme: Theme, user: &User, snap: &SimulationSnapshot) -> String {
    let mut resources = String::new();
    for r in &snap.resources {
        let _ = write!(resources, "<tr><td>{}</td><td>{} {}</td></tr>", r.label, r.value, r.unit);
    }
    let mut infra = String::new();
    for i in &snap.infrastructure {
        let _ = write!(
            infra,
            "<tr><td>{}</td><td>{} / {} {}</td><td>{:.1}%</td></tr>",
            i.label, i.current, i.max, i.unit, i.percentage
        );
    }
    let mut series = String::new();
    for (c, p) in snap.resource_consumption.iter().zip(&snap.performance) {
        let _ = write!(series, "<tr><td>{}</td><td>{:.1}</td><td>{:.1}</td></tr>", c.name, c.value, p.value);
    }
    let body = format!(
        r#"<h1>Population Load Simulation</h1>
<div class="grid">
<div class="card">
<p>Population: <strong>{population}B</strong></p>
<form method="post" action="/simulation/population">
<input name="population" type="number" min="1" max="20" step="0.1" value="{population}">
<button type="submit">Apply</button></form>
<form method="post" action="/simulation/toggle"><button type="submit">{toggle}</button></form>
<form method="post" action="/simulation/reset"><button type="submit">Reset</button></form>
<p>Status: {running} &middot; {elapsed}s elapsed</p>
</div>
<div class="card">
<p>System load: <strong class="{load_class}">{load:.1}%</strong></p>
<p class="{load_class}">{load_message}</p>
<p>System stability threshold: 15B population</p>
<p>Resource depletion risk: {risk}%</p>
<p>Infra scaling capacity: <span class="{scaling}">{scaling_upper}</span></p>
</div>
</div>
<h2>Resource Allocation</h2><div class="card"><table>{resources}</table></div>
<h2>Infrastructure Analysis</h2><div class="card"><table>{infra}</table></div>
<h2>Consumption &amp; Performance</h2>
<div class="card"><table><thead><tr><th>Time</th><th>Consumption (M barrels)</th><th>Efficiency (%)</th></tr></thead>{series}</table></div>"#,
        population = snap.population,
        toggle = if snap.running { "Pause" } else { "Start" },
        running = if snap.running { "Running" } else { "Paused" },
        elapsed = snap.elapsed_secs,
        load = snap.system_load,
        load_class = snap.load_status.as_str(),
        load_message = snap.load_message,
        risk = snap.depletion_risk_percent,
        scaling = snap.scaling_capacity.as_str(),
        scaling_upper = snap.scaling_capacity.as_str().to_uppercase(),
    );
    layout("Simulation", theme, Some(user), "/simulation", &body)
}

pub fn settings(theme: Theme, user: &User, thresholds: &ThresholdSettings, message: Option<&str>) -> String {
    let message = message
        .map(|m| format!(r#"<p class="card">{}</p>"#, html_escape(m)))
        .unwrap_or_default();
    let other = match theme {
        Theme::Dark => Theme::Light,
        Theme::Light => Theme::Dark,
    };
    let p = ThresholdSettings::PRESSURE_RANGE;
    let t = ThresholdSettings::TEMPERATURE_RANGE;
    let f = ThresholdSettings::FLOW_RATE_RANGE;
    let body = format!(
        r#"<h1>Settings</h1>
{message}
<div class="card">
<h2>Appearance</h2>
<p>Current theme: {theme}</p>
<form method="post" action="/settings/theme">
<input type="hidden" name="theme" value="{other}">
<button type="submit">Switch to {other} mode</button></form>
</div>
<div class="card">
<h2>Alert Thresholds</h2>
<p class="muted">Configure the threshold values that trigger warnings and critical alerts in the system.</p>
<form method="post" action="/settings/thresholds">
<label>Pressure (PSI) <input name="pressure" type="number" min="{p_min}" max="{p_max}" step="5" value="{pressure}"></label><br>
<label>Temperature (&deg;C) <input name="temperature" type="number" min="{t_min}" max="{t_max}" step="1" value="{temperature}"></label><br>
<label>Flow Rate (L/min) <input name="flow_rate" type="number" min="{f_min}" max="{f_max}" step="5" value="{flow_rate}"></label><br>
<button type="submit">Save Settings</button>
</form>
<form method="post" action="/settings/thresholds/reset"><button type="submit">Reset to Defaults</button></form>
</div>"#,
        pressure = thresholds.pressure,
        temperature = thresholds.temperature,
        flow_rate = thresholds.flow_rate,
        p_min = p.start(),
        p_max = p.end(),
        t_min = t.start(),
        t_max = t.end(),
        f_min = f.start(),
        f_max = f.end(),
    );
    layout("Settings", theme, Some(user), "/settings", &body)
}

pub fn admin(theme: Theme, user: &User, analytics: &AdminAnalytics, filter: RegionFilter, total_regions: usize) -> String {
    let u = &analytics.users;
    let mut regions = String::new();
    for r in &analytics.regions {
        let _ = write!(
            regions,
            r#"<tr><td>{}</td><td>{}</td><td>{}</td><td class="{3}">{3}</td></tr>"#,
            r.id, r.name, r.users, r.status
        );
    }
    let mut roles = String::new();
    for role in &analytics.roles {
        let _ = write!(roles, "<tr><td>{}</td><td>{}</td></tr>", role.name, role.value);
    }
    let mut access = String::new();
    for month in &analytics.monthly_access {
        let _ = write!(access, "<tr><td>{}</td><td>{}</td></tr>", month.name, month.value);
    }
    let mut users = String::new();
    for user in &analytics.recent_users {
        let _ = write!(
            users,
            r#"<tr><td>{}</td><td>{}</td><td>{}</td><td class="{}">{}</td><td>{}</td></tr>"#,
            user.name,
            user.role,
            user.region,
            if user.active { "active" } else { "muted" },
            if user.active { "active" } else { "inactive" },
            user.last_active
        );
    }
    let filter_label = match filter {
        RegionFilter::All => "all",
        RegionFilter::Only(status) => status.as_str(),
    };
    let body = format!(
        r#"<h1>Administration</h1>
<section class="grid">
<div class="card"><p class="muted">Total Users</p><h2>{total}</h2></div>
<div class="card"><p class="muted">Active Sessions</p><h2>{active}</h2></div>
<div class="card"><p class="muted">Admin Users</p><h2>{admins}</h2></div>
<div class="card"><p class="muted">Regions</p><h2>{region_count}</h2></div>
</section>
<h2>Users</h2>
<div class="card"><table><thead><tr><th>Name</th><th>Role</th><th>Region</th><th>Status</th><th>Last Active</th></tr></thead>{users}</table></div>
<h2>Regions <small class="muted">filter: {filter_label}</small></h2>
<p><a href="/admin">all</a> &middot; <a href="/admin?region=active">active</a> &middot; <a href="/admin?region=warning">warning</a> &middot; <a href="/admin?region=inactive">inactive</a></p>
<div class="card"><table><thead><tr><th>ID</th><th>Name</th><th>Users</th><th>Status</th></tr></thead>{regions}</table></div>
<h2>Analytics</h2>
<div class="grid">
<div class="card"><h3>User Roles</h3><table>{roles}</table></div>
<div class="card"><h3>System Access</h3><table>{access}</table></div>
</div>"#,
        total = u.total,
        active = u.active,
        admins = u.admins,
        region_count = total_regions,
    );
    layout("Admin", theme, Some(user), "/admin", &body)
}
