use crate::types::FanStatus;

/// Turns the current readings and fan state into a status page body.
pub trait Render {
    fn render(&self, status: &FanStatus) -> String;
}

impl<F> Render for F
where
    F: Fn(&FanStatus) -> String,
{
    fn render(&self, status: &FanStatus) -> String {
        self(status)
    }
}

pub const THRESHOLD_CHOICES: std::ops::RangeInclusive<i32> = 14..=26;

const PAGE_HEAD: &str = r#"<html>
<head>
 <title>Attic Fan</title>
 <meta name="viewport" content="width=device-width, initial-scale=1">
 <meta http-equiv="Refresh" content="60; URL=/">
 <link rel="icon" href="data:,">
 <style>
    html{font-family: Helvetica; display:inline-block; margin: 0px auto; text-align: center;}
    h1{color: #0F3376; padding: 2vh;}
    a{text-decoration: none;}
    p{font-size: 1.2em;}
    p.tpx{font-size: 1em; color: #FF8800;}
    .button{display: inline-block; background-color: #e7bd3b; border: none;border-radius: 4px; color: white;
            padding: 12px 20px; text-decoration: none; font-size: 18px; margin: 2px; cursor: pointer;}
    .button2{background-color: #4286f4;}
    .reset{background-color: #ff2222; font-size: 10; padding: 5px 10px;}
 </style>
</head>
"#;

#[derive(Debug, Clone, Copy, Default)]
pub struct StatusPage;

impl Render for StatusPage {
    fn render(&self, status: &FanStatus) -> String {
        let mut options = String::new();
        for value in THRESHOLD_CHOICES {
            let selected = if value == status.threshold {
                " selected"
            } else {
                ""
            };
            options.push_str(&format!(
                "        <option value=\"{value}\"{selected}>{value}</option>\n"
            ));
        }

        format!(
            r#"{PAGE_HEAD}<body>
  <a href="/"><h1>Attic Fan</h1></a>
  <p class="tpx">Temperature: <strong>{temperature:.2}</strong>C / Humidity: <strong>{humidity:.2}</strong>%</p>
  <hr>
  <p>Fan status: <strong>{fan}</strong> / Fan: <strong>{mode}</strong></p>
  <p>
    <a href="/?force=on"><button class="button">Force</button></a>
    <a href="/?force=off"><button class="button button2">Automatic</button></a>
  </p>
  <hr>
  <p><form>
      <label for="temp">Temperature threshold:</label>
      <select name="temp" id="temp" onchange="this.form.submit()">
{options}      </select> C
    </form>
  </p>
  <p>Threshold: <strong id="threshold">{threshold}</strong>C</p>
  <div>
    <a href="/?command=reset"><button class="button reset">Reset</button></a>
  </div>
</body>
</html>
"#,
            temperature = status.temperature,
            humidity = status.humidity,
            fan = status.fan_label(),
            mode = status.mode().label(),
            threshold = status.threshold,
        )
    }
}

pub fn error_page(code: u16, reason: &str) -> String {
    format!(
        r#"<html>
<head>
 <title>{code} {reason}</title>
 <meta name="viewport" content="width=device-width, initial-scale=1">
 <meta http-equiv="Refresh" content="5; URL=/">
 <link rel="icon" href="data:,">
</head>
<body>
<h2>{code} ({reason}).</h2>
</body>
</html>
"#
    )
}
