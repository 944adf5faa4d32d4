//! Prompt registry.

/// Name of the usage-guide prompt.
pub const GBOX_MANUAL: &str = "gbox-manual";

/// Description of the usage-guide prompt.
pub const GBOX_MANUAL_DESCRIPTION: &str = "Gbox Usage Guide";

/// Body of the usage-guide prompt.
pub const GBOX_MANUAL_TEXT: &str = "\
# Gbox Usage Guide

Gbox gives you a remote Android phone, Linux desktop or browser (a \"box\") that \
you drive through tools.

## Getting started

1. Call the start tool for your platform first (`start_android_box`, \
`start_linux_box` or `start_browser_box`). Pass `gboxId` to reuse an existing \
box, or omit it to create a new one.
2. Keep the returned `boxId`; every other tool needs it.
3. Open the returned `liveViewUrl` if a human wants to watch.

## Acting on the screen

- Describe targets in plain language (`'blue Sign in button at the bottom'`). \
Be specific enough that only one element matches.
- Most actions return a screenshot taken shortly after the action. Look at it \
before deciding the next step.
- Use `wait` when something is loading, then continue from its screenshot.
- Use `screenshot` whenever you are unsure what is on screen.

## Platform notes

- Android: `tap`, `swipe`, `press_button` (home, back, power, volume), \
`open_app`/`close_app` by package name, `install_apk` from a URL.
- Linux: `click`, `scroll`, `press_key`, `open_browser`.
- Browser: `click`, `scroll`, `press_key` plus `list_tabs`, `open_tab`, \
`switch_tab` and `close_tab`. The last open tab cannot be closed.

## Typing

`type` writes into the focused field. Set `replace` to overwrite existing text \
and `pressEnterAfterType` to submit.
";
