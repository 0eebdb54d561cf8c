use axum::extract::State;
use axum::response::Html;

use crate::handles::HubState;
use crate::services::HubSnapshot;

const REFRESH_SECONDS: u32 = 5;

pub async fn get_dashboard(State(state): State<HubState>) -> Html<String> {
    Html(render_dashboard(&state.service.snapshot().await))
}

fn on_off(value: bool) -> &'static str {
    if value { "ON" } else { "OFF" }
}

pub fn render_dashboard(snapshot: &HubSnapshot) -> String {
    let readings = match &snapshot.reading {
        Some(reading) => format!(
            r#"<p>Temperature: {} &deg;C</p>
<p>Humidity: {} %</p>
<p>Light: {} lux</p>
<p>Heater: {}</p>
<p>Dehumidifier: {}</p>
<p class="muted">Received {}</p>"#,
            reading.temperature,
            reading.humidity,
            reading.lux,
            on_off(reading.heater),
            on_off(reading.dehumidifier),
            snapshot.received_at.as_deref().unwrap_or("-"),
        ),
        None => "<p>No data from station yet</p>".to_string(),
    };

    let pending = snapshot
        .pending
        .map(|p| {
            format!(
                r#"<p class="muted">Pending: {} &deg;C / {} %</p>"#,
                p.temperature, p.humidity
            )
        })
        .unwrap_or_default();

    let setpoints = &snapshot.setpoints;

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<meta http-equiv="refresh" content="{refresh}">
<title>ClimaSync</title>
<style>
body {{ font-family: sans-serif; margin: 2em; }}
.muted {{ color: #777; }}
</style>
</head>
<body>
<h1>ClimaSync</h1>
{readings}
<h2>Setpoints</h2>
<p>Temperature: {temperature} &deg;C</p>
<p>Humidity: {humidity} %</p>
{pending}
<form method="post" action="/update">
<label>Temperature <input type="range" name="temp" min="0" max="50" step="0.5" value="{temperature}"
  oninput="this.nextElementSibling.value = this.value"><output>{temperature}</output></label><br>
<label>Humidity <input type="range" name="humidity" min="0" max="100" step="1" value="{humidity}"
  oninput="this.nextElementSibling.value = this.value"><output>{humidity}</output></label><br>
<button type="submit">Update</button>
</form>
<p class="muted">Link: {channel}, handshake {handshake}</p>
</body>
</html>
"#,
        refresh = REFRESH_SECONDS,
        readings = readings,
        temperature = setpoints.temperature,
        humidity = setpoints.humidity,
        pending = pending,
        channel = snapshot.link.channel,
        handshake = snapshot.link.handshake,
    )
}
