//! Canonical command names for WebDriver protocol routes.
//!
//! The text-log tokenizer annotates every recorded request with the command
//! it represents (`findElement`, `elementClick`, ...). The tables are data:
//! coverage matters, the matching itself is a plain exact-then-pattern scan.

use regex::Regex;
use std::sync::LazyLock;

pub const UNKNOWN_COMMAND: &str = "unknownCommand";

/// W3C WebDriver routes.
const WEBDRIVER_COMMANDS: &[(&str, &str)] = &[
    ("POST /session", "newSession"),
    ("DELETE /session/:sessionId", "deleteSession"),
    ("POST /session/:sessionId/url", "navigateTo"),
    ("GET /session/:sessionId/url", "getCurrentUrl"),
    ("POST /session/:sessionId/back", "navigateBack"),
    ("POST /session/:sessionId/forward", "navigateForward"),
    ("POST /session/:sessionId/refresh", "refresh"),
    ("GET /session/:sessionId/title", "getTitle"),
    ("POST /session/:sessionId/window", "createNewWindow"),
    ("DELETE /session/:sessionId/window", "closeWindow"),
    ("GET /session/:sessionId/window", "getWindowHandle"),
    ("GET /session/:sessionId/window/handles", "getWindowHandles"),
    ("POST /session/:sessionId/window/rect", "setWindowRect"),
    ("GET /session/:sessionId/window/rect", "getWindowRect"),
    ("POST /session/:sessionId/window/maximize", "maximizeWindow"),
    ("POST /session/:sessionId/window/minimize", "minimizeWindow"),
    ("POST /session/:sessionId/window/fullscreen", "fullscreenWindow"),
    ("POST /session/:sessionId/element", "findElement"),
    ("POST /session/:sessionId/elements", "findElements"),
    ("POST /session/:sessionId/element/:id/element", "findElementFromElement"),
    ("POST /session/:sessionId/element/:id/elements", "findElementsFromElement"),
    ("GET /session/:sessionId/element/:id/attribute/:name", "getElementAttribute"),
    ("GET /session/:sessionId/element/:id/property/:name", "getElementProperty"),
    ("GET /session/:sessionId/element/:id/css/:propertyName", "getElementCSSValue"),
    ("GET /session/:sessionId/element/:id/text", "getElementText"),
    ("GET /session/:sessionId/element/:id/name", "getElementTagName"),
    ("GET /session/:sessionId/element/:id/rect", "getElementRect"),
    ("GET /session/:sessionId/element/:id/enabled", "isElementEnabled"),
    ("GET /session/:sessionId/element/:id/displayed", "isElementDisplayed"),
    ("GET /session/:sessionId/element/:id/selected", "isElementSelected"),
    ("POST /session/:sessionId/element/:id/click", "elementClick"),
    ("POST /session/:sessionId/element/:id/clear", "elementClear"),
    ("POST /session/:sessionId/element/:id/value", "elementSendKeys"),
    ("GET /session/:sessionId/source", "getPageSource"),
    ("POST /session/:sessionId/execute/sync", "executeScript"),
    ("POST /session/:sessionId/execute/async", "executeAsyncScript"),
    ("POST /session/:sessionId/cookie", "addCookie"),
    ("GET /session/:sessionId/cookie", "getCookies"),
    ("GET /session/:sessionId/cookie/:name", "getCookie"),
    ("DELETE /session/:sessionId/cookie", "deleteAllCookies"),
    ("DELETE /session/:sessionId/cookie/:name", "deleteCookie"),
    ("GET /session/:sessionId/alert/text", "getAlertText"),
    ("POST /session/:sessionId/alert/accept", "acceptAlert"),
    ("POST /session/:sessionId/alert/dismiss", "dismissAlert"),
    ("POST /session/:sessionId/alert/text", "sendAlertText"),
    ("POST /session/:sessionId/frame", "switchToFrame"),
    ("POST /session/:sessionId/frame/parent", "switchToParentFrame"),
    ("POST /session/:sessionId/timeouts", "setTimeouts"),
    ("POST /session/:sessionId/actions", "performActions"),
    ("DELETE /session/:sessionId/actions", "releaseActions"),
    ("GET /session/:sessionId/screenshot", "takeScreenshot"),
    ("GET /session/:sessionId/element/:id/screenshot", "takeElementScreenshot"),
];

/// Legacy JSONWire routes behind the `/wd/hub` prefix.
const JSONWIRE_COMMANDS: &[(&str, &str)] = &[
    ("GET /wd/hub/status", "status"),
    ("POST /wd/hub/session", "newSession"),
    ("DELETE /wd/hub/session/:sessionId", "deleteSession"),
    ("POST /wd/hub/session/:sessionId/element", "findElement"),
    ("POST /wd/hub/session/:sessionId/elements", "findElements"),
    ("POST /wd/hub/session/:sessionId/element/:id/click", "elementClick"),
    ("POST /wd/hub/session/:sessionId/element/:id/clear", "elementClear"),
    ("POST /wd/hub/session/:sessionId/element/:id/value", "elementSendKeys"),
    ("GET /wd/hub/session/:sessionId/source", "getPageSource"),
    ("GET /wd/hub/session/:sessionId/url", "getCurrentUrl"),
    ("POST /wd/hub/session/:sessionId/url", "navigateTo"),
    ("POST /wd/hub/session/:sessionId/execute", "executeScript"),
];

/// Appium device routes seen in app-automate logs.
const APPIUM_COMMANDS: &[(&str, &str)] = &[
    ("POST /session/:sessionId/appium/device/lock", "lockDevice"),
    ("POST /session/:sessionId/appium/device/unlock", "unlockDevice"),
    ("GET /session/:sessionId/appium/device/time", "getDeviceTime"),
    ("POST /session/:sessionId/appium/app/launch", "launchApp"),
    ("POST /session/:sessionId/appium/app/close", "closeApp"),
    ("POST /session/:sessionId/appium/device/press_keycode", "pressKeyCode"),
    ("POST /session/:sessionId/appium/device/long_press_keycode", "longPressKeyCode"),
    ("POST /session/:sessionId/appium/device/touch_id", "touchId"),
    ("POST /session/:sessionId/appium/device/shake", "shakeDevice"),
    ("POST /session/:sessionId/appium/device/hide_keyboard", "hideKeyboard"),
    ("POST /session/:sessionId/appium/device/is_keyboard_shown", "isKeyboardShown"),
];

struct CommandPattern {
    method: &'static str,
    path: &'static str,
    name: &'static str,
    regex: Regex,
}

static COMMAND_PATTERNS: LazyLock<Vec<CommandPattern>> = LazyLock::new(|| {
    WEBDRIVER_COMMANDS
        .iter()
        .chain(JSONWIRE_COMMANDS)
        .chain(APPIUM_COMMANDS)
        .map(|(pattern, name)| {
            let (method, path) = pattern
                .split_once(' ')
                .expect("command pattern is 'METHOD /path'");
            // Path placeholders (:sessionId, :id, :name, :propertyName)
            // each match one path segment.
            let segments: Vec<String> = path
                .split('/')
                .map(|seg| {
                    if seg.starts_with(':') {
                        "[^/]+".to_string()
                    } else {
                        regex::escape(seg)
                    }
                })
                .collect();
            let regex = Regex::new(&format!("^{}$", segments.join("/")))
                .expect("command pattern compiles");
            CommandPattern {
                method,
                path,
                name,
                regex,
            }
        })
        .collect()
});

/// Resolve `(HTTP method, raw endpoint)` to a canonical command name.
///
/// The endpoint is the raw path as recorded in the log, session prefix
/// included. Exact table match wins; otherwise the first same-method
/// placeholder pattern that matches; otherwise `"unknownCommand"`.
pub fn resolve_command_name(method: &str, endpoint: &str) -> &'static str {
    let method = method.to_uppercase();

    for pattern in COMMAND_PATTERNS.iter() {
        if pattern.method == method && pattern.path == endpoint {
            return pattern.name;
        }
    }

    for pattern in COMMAND_PATTERNS.iter() {
        if pattern.method != method {
            continue;
        }
        if pattern.regex.is_match(endpoint) {
            return pattern.name;
        }
    }

    UNKNOWN_COMMAND
}
