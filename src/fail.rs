// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

use custom_error::custom_error;

custom_error! {
    #[derive(PartialEq, Eq, Clone)]
    pub Fail

    Malformed { details: &'static str } = "malformed packet: {details}",
}
